//! `ledger`: herramienta de operación del ledger de clientes.
//!
//! ```text
//! ledger migrate
//! ledger sync page --kind persons|contracts [--page N] [--per-page N] [--stage-only]
//! ledger sync full [--per-page N] [--no-contracts] [--timeout-secs N]
//! ledger recalc [--only stale|age]
//! ledger draft <CLIENT_ID> [--risk-level L] [--data JSON] [--actor ID]
//! ledger submit|approve <CLIENT_ID> [--actor ID]
//! ledger reject|request-docs <CLIENT_ID> --reason TXT [--actor ID]
//! ledger history <CLIENT_ID> [--second-part]
//! ledger clients [--needs-second-part B] [--status S] [--due-before TS] [--page N] [--per-page N]
//! ```
//!
//! Códigos de salida: 2 configuración, 4 rechazo de dominio, 5 error de infraestructura.

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use ledger_core::{SecondPartStatus, SourceKind};

#[derive(Parser, Debug)]
#[command(name = "ledger", version, about = "Operación del ledger SCD2 de clientes y su segunda parte")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Aplica las migraciones pendientes.
    Migrate,
    /// Sincroniza desde la fuente externa.
    Sync {
        #[command(subcommand)]
        command: SyncCommand,
    },
    /// Ejecuta los barridos de recálculo.
    Recalc {
        #[arg(long, value_enum)]
        only: Option<RecalcOnly>,
    },
    /// Crea un borrador de segunda parte.
    Draft {
        client_id: i64,
        #[arg(long)]
        risk_level: Option<String>,
        /// Documento JSON que reemplaza los datos heredados.
        #[arg(long)]
        data: Option<String>,
        #[arg(long)]
        actor: Option<i64>,
    },
    Submit {
        client_id: i64,
        #[arg(long)]
        actor: Option<i64>,
    },
    Approve {
        client_id: i64,
        #[arg(long)]
        actor: Option<i64>,
    },
    Reject {
        client_id: i64,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        actor: Option<i64>,
    },
    RequestDocs {
        client_id: i64,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        actor: Option<i64>,
    },
    /// Historial de versiones de un cliente (o de su segunda parte).
    History {
        client_id: i64,
        #[arg(long)]
        second_part: bool,
    },
    /// Lista clientes vigentes con su segunda parte.
    Clients {
        #[arg(long)]
        needs_second_part: Option<bool>,
        #[arg(long)]
        status: Option<SecondPartStatus>,
        /// RFC 3339.
        #[arg(long)]
        due_before: Option<chrono::DateTime<chrono::Utc>>,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 100)]
        per_page: i64,
    },
}

#[derive(Subcommand, Debug)]
enum SyncCommand {
    /// Una sola página.
    Page {
        #[arg(long, default_value = "persons")]
        kind: SourceKind,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 100)]
        per_page: i64,
        /// Solo guarda en staging, sin aplicar.
        #[arg(long)]
        stage_only: bool,
    },
    /// Todas las páginas de personas y contratos.
    Full {
        #[arg(long)]
        per_page: Option<i64>,
        #[arg(long)]
        no_contracts: bool,
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RecalcOnly {
    Stale,
    Age,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    // Cargar .env si existe para obtener DATABASE_URL y EXTERNAL_API_*
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    if let Err(e) = commands::run(cli.command) {
        eprintln!("[ledger] error: {e}");
        std::process::exit(e.exit_code());
    }
}
