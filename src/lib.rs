//! ledgersync
//!
//! Paquete raíz del daemon:
//! - `config`: agrega la configuración de base de datos, fuente externa y scheduler.
//! - `errors`: errores de arranque del proceso.

pub mod config;
pub mod errors;

pub use config::AppConfig;
pub use errors::AppError;
