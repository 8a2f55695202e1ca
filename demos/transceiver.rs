// ABOUTME: Long-running ESME transceiver demo with logging processors
// ABOUTME: Binds, optionally sends periodic SMS, logs inbound messages and receipts, then unbinds

//! # ESME Transceiver
//!
//! Connects to an SMSC as a transceiver, stays bound across connection
//! failures and logs every inbound message and delivery receipt.
//!
//! ## Usage
//!
//! ```bash
//! # Stay bound and log inbound traffic for five minutes
//! cargo run --example transceiver -- --system-id test --password secret
//!
//! # Also send a message every 60 seconds
//! cargo run --example transceiver -- \
//!   --system-id test --password secret \
//!   --to 27831234567 --from 12345 \
//!   --sms-interval 60
//! ```

use argh::FromArgs;
use smpp_esme::client::{
    BindCredentials, DeliveryReportProcessor, EsmeClient, EsmeConfig, InMemoryStore,
    KeepAliveConfig, SessionState, ShortMessageProcessor, SmsMessage,
};
use smpp_esme::datatypes::{CommandStatus, DeliverSm, DeliveryReceipt, SubmitSmResponse};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Long-running SMPP transceiver
#[derive(FromArgs)]
struct CliArgs {
    /// whether or not to enable debugging
    #[argh(switch, short = 'd')]
    debugging: bool,

    /// the system id
    #[argh(option)]
    system_id: Option<String>,

    /// the password
    #[argh(option)]
    password: Option<String>,

    /// the hostname of IP address of the SMSC (default: localhost)
    #[argh(option)]
    host: Option<String>,

    /// the port to use when connecting to the SMSC (default: 2775)
    #[argh(option, short = 'p')]
    port: Option<u16>,

    /// keep-alive interval in seconds (default: 55)
    #[argh(option)]
    keep_alive_interval: Option<u64>,

    /// how long to run in seconds (default: 300)
    #[argh(option)]
    run_duration: Option<u64>,

    /// interval between SMS sends in seconds (default: 60)
    #[argh(option)]
    sms_interval: Option<u64>,

    /// the recipient telephone number (no SMS sent if not provided)
    #[argh(option, short = 't')]
    to: Option<String>,

    /// the telephone number that the message will be from
    #[argh(option, short = 'f')]
    from: Option<String>,
}

struct LoggingProcessor;

impl ShortMessageProcessor for LoggingProcessor {
    async fn handle_submit_sm_resp(
        &self,
        response: SubmitSmResponse,
        message_id: Option<String>,
    ) -> Result<(), smpp_esme::Error> {
        info!(
            message_id = message_id.as_deref().unwrap_or("?"),
            smsc_message_id = %response.message_id,
            status = ?response.command_status,
            "submit_sm_resp"
        );
        Ok(())
    }

    async fn handle_deliver_sm(&self, pdu: DeliverSm) -> Result<CommandStatus, smpp_esme::Error> {
        info!(
            from = %pdu.source_addr,
            to = %pdu.destination_addr,
            text = %String::from_utf8_lossy(pdu.message_body()),
            "message received"
        );
        Ok(CommandStatus::Ok)
    }
}

impl DeliveryReportProcessor for LoggingProcessor {
    async fn handle_delivery_report(
        &self,
        pdu: DeliverSm,
        receipt: Option<DeliveryReceipt>,
    ) -> Result<CommandStatus, smpp_esme::Error> {
        match receipt {
            Some(receipt) => info!(
                smsc_message_id = %receipt.id,
                state = ?receipt.state,
                error = receipt.error.as_deref().unwrap_or("-"),
                "delivery receipt"
            ),
            None => info!(
                from = %pdu.source_addr,
                "delivery receipt without a recognisable body"
            ),
        }
        Ok(CommandStatus::Ok)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = argh::from_env();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli_args.debugging {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let host = cli_args.host.unwrap_or_else(|| "localhost".to_owned());
    let port = cli_args.port.unwrap_or(2775);
    let system_id = cli_args.system_id.unwrap_or_default();
    let password = cli_args.password.unwrap_or_default();
    let run_duration = Duration::from_secs(cli_args.run_duration.unwrap_or(300));
    let sms_interval = Duration::from_secs(cli_args.sms_interval.unwrap_or(60));

    let mut config = EsmeConfig::new(host, port)
        .with_credentials(BindCredentials::transceiver(system_id, password));
    if let Some(seconds) = cli_args.keep_alive_interval {
        config = config.with_keep_alive(KeepAliveConfig::new(Duration::from_secs(seconds)));
    }

    info!(address = %config.address(), "starting transceiver");
    let processor = Arc::new(LoggingProcessor);
    let client = EsmeClient::connect_tcp(
        config,
        Arc::clone(&processor),
        processor,
        Arc::new(InMemoryStore::new()),
    )?;

    let outbound = cli_args.to.zip(cli_args.from);
    let mut sms_timer = interval(sms_interval);
    let deadline = sleep(run_duration);
    tokio::pin!(deadline);
    let mut message_count = 0u32;

    loop {
        tokio::select! {
            _ = &mut deadline => {
                info!("run duration elapsed, shutting down");
                break;
            }
            _ = sms_timer.tick(), if outbound.is_some() => {
                if client.state() != SessionState::Bound {
                    info!(state = %client.state(), "not bound, skipping send");
                    continue;
                }
                let Some((to, from)) = &outbound else { continue };
                message_count += 1;
                let text = format!("Test message #{message_count} from transceiver demo");
                let message_id = format!("demo-{message_count}");

                match client.send_sms(message_id.as_str(), &SmsMessage::new(to, from, text)).await {
                    Ok(response) => info!(%message_id, smsc_message_id = %response.message_id, "message sent"),
                    Err(e) => error!(%message_id, error = %e, "send failed"),
                }
            }
        }
    }

    client.disconnect().await?;
    info!(messages = message_count, "transceiver stopped");
    Ok(())
}
