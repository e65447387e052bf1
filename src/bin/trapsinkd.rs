//! trapsinkd: a standalone SNMPv3 trap receiver.
//!
//! Provisions one USM user from command-line credentials, binds a UDP
//! socket, and logs every decoded notification until interrupted.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use bytes::Bytes;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use trapsink::lcd::{MemoryLcd, TimeEntry, TimeTable, UserTable, UsmUser};
use trapsink::notification::{BoxFuture, Notification, NotificationReceiver};
use trapsink::transport::bind_udp_socket;
use trapsink::{Engine, EngineId, Result};

#[derive(Parser, Debug)]
#[command(name = "trapsinkd", about = "SNMPv3 trap and inform receiver")]
struct Args {
    /// UDP address to listen on (standard trap port is 162)
    #[arg(long, default_value = "0.0.0.0:16200")]
    bind: SocketAddr,

    /// Authoritative engine ID as hex (5..=32 bytes)
    #[arg(long)]
    engine_id: String,

    /// USM user name
    #[arg(long)]
    user: String,

    /// Authentication password (HMAC-SHA-1)
    #[arg(long)]
    auth_password: String,

    /// Privacy password (AES-128-CFB)
    #[arg(long)]
    priv_password: String,

    /// snmpEngineBoots of the sending engine
    #[arg(long, default_value_t = 0)]
    boots: i32,

    /// snmpEngineTime of the sending engine at provisioning
    #[arg(long, default_value_t = 0)]
    time: i32,

    /// Receive buffer size in bytes
    #[arg(long, default_value_t = trapsink::DEFAULT_MAX_RECV_SIZE)]
    max_recv_size: usize,
}

struct LogReceiver;

impl NotificationReceiver for LogReceiver {
    fn process_pdu(
        &self,
        _cancel: CancellationToken,
        notification: Notification,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            tracing::info!(
                source = %notification.source,
                pdu_type = %notification.pdu_type(),
                user = %String::from_utf8_lossy(&notification.user_name),
                uptime = notification.uptime(),
                trap_oid = ?notification.trap_oid().map(|o| o.to_string()),
                "notification"
            );
            for vb in &notification.pdu.varbinds {
                tracing::info!(varbind = %vb, "  binding");
            }
            Ok(())
        })
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    let s: String = s.chars().filter(|c| *c != ':').collect();
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "exiting");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let engine_id_bytes = decode_hex(&args.engine_id)
        .ok_or_else(|| trapsink::Error::Config("engine-id is not valid hex".into()))?;
    let engine_id = EngineId::new(Bytes::from(engine_id_bytes))?;

    let lcd = Arc::new(MemoryLcd::new());
    lcd.add_user(UsmUser::from_passwords(
        engine_id.clone(),
        Bytes::from(args.user.into_bytes()),
        args.auth_password.as_bytes(),
        args.priv_password.as_bytes(),
    ))?;
    lcd.add_time(TimeEntry::new(engine_id, args.boots, args.time))?;

    let engine = Engine::builder(lcd)
        .max_recv_size(args.max_recv_size)
        .notification_receiver(Arc::new(LogReceiver))
        .build()?;

    let socket = bind_udp_socket(args.bind)
        .await
        .map_err(|source| trapsink::Error::Io { source })?;

    let token = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            token.cancel();
        }
    });

    engine.serve(socket).await
}
