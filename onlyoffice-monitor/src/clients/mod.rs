/**
 * CLIENTS - Implémentations réelles des systèmes externes
 *
 * RÔLE :
 * Brancher les traits de crate::probes sur la vraie stack :
 * - DockerClient : API Docker Engine en HTTP (reqwest)
 * - MySqlDatabase : une connexion sqlx par appel
 * - ElasticClient : /_cluster/health (reqwest)
 *
 * Aucun état partagé ici, les clients sont construits une fois au démarrage.
 */

pub mod docker;
pub mod elastic;
pub mod mysql;

pub use docker::DockerClient;
pub use elastic::ElasticClient;
pub use mysql::MySqlDatabase;

use std::time::Duration;

/// Timeout appliqué à chaque requête HTTP sortante
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
