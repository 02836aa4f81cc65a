//! # Discord Webhook Alerts
//!
//! Posts an embed to a Discord channel when a checkup finds a listing that
//! needs attention: we are no longer the cheapest offer, the proposed price
//! runs at a loss, or the item cannot currently be sold.
//!
//! ## Features
//!
//! - **One embed per listing**: every alert carries the numbers needed to reprice by hand
//! - **Severity colors**: red when the proposed price loses money, amber otherwise
//! - **Delivery report**: [`DiscordNotifier::send_alert`] says whether Discord accepted
//!   the message, so the caller can keep an undelivered alert pending
//! - **Optional Integration**: disables itself if no webhook URL is configured
//!
//! ## Embed Structure
//!
//! Each alert includes:
//! - **Title**: the SKU, e.g. "⚠️ SKU-1 needs attention"
//! - **Description**: the product title, or "Item <id>" when the page had none
//! - **URL**: the product page on walmart.com
//! - **Color**: red (`0x00E7_4C3C`) for losses, amber (`0x00F3_9C12`) for everything else
//! - **Fields**: our rank, cheapest offer, stock, our price, proposed and floor
//!   price, verdict with margin
//! - **Timestamp**: when the checkup ran
//!
//! ## Rate Limits
//!
//! Discord webhooks allow 30 requests per minute and 25 fields per embed. A
//! checkup sends at most one message per tracked product and spaces products
//! by `SCRAPE_DELAY_MS`, and an embed carries at most 7 fields.
//!
//! ## Error Handling
//!
//! Network failures come back as `Err`; a non-success status is logged and
//! reported as not delivered. Neither is fatal to a checkup.
//!
//! ## Environment Configuration
//!
//! Set `DISCORD_WEBHOOK_URL` to enable alerts. Without it, alerts are skipped
//! and stay pending.

use anyhow::Result;
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::{debug, error, info};

use crate::models::{
    DiscordEmbed, DiscordField, DiscordMessage, MinimumViablePrice, ProductSnapshot, Verdict,
};

const LOSS_COLOR: u32 = 0x00E7_4C3C;
const ATTENTION_COLOR: u32 = 0x00F3_9C12;

/// Discord webhook client for checkup alerts.
///
/// Functions normally when no webhook is configured; every send is then a
/// no-op. Cloning shares the underlying connection pool.
pub struct DiscordNotifier {
    client: Client,
    webhook_url: Option<String>,
}

impl DiscordNotifier {
    /// Creates a notifier posting to `webhook_url`.
    ///
    /// `None` yields a notifier whose sends all report "not delivered"
    /// without touching the network.
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            webhook_url,
        }
    }

    /// Sends an alert for a snapshot and returns whether Discord accepted it.
    ///
    /// ## Error Handling
    ///
    /// - **Missing webhook URL**: `Ok(false)`, logged at debug level
    /// - **Network failures**: propagated as `anyhow::Error`
    /// - **HTTP errors**: logged with status code, returns `Ok(false)`
    pub async fn send_alert(&self, snapshot: &ProductSnapshot, product_url: &str) -> Result<bool> {
        let Some(webhook_url) = &self.webhook_url else {
            debug!(sku = %snapshot.sku, "Discord webhook not configured, alert not sent");
            return Ok(false);
        };

        let message = DiscordMessage {
            embeds: vec![build_embed(snapshot, product_url)],
        };

        let response = self.client.post(webhook_url).json(&message).send().await?;

        if response.status().is_success() {
            info!(sku = %snapshot.sku, "Discord alert sent");
            Ok(true)
        } else {
            error!(sku = %snapshot.sku, "Failed to send Discord alert: {}", response.status());
            Ok(false)
        }
    }
}

fn money(value: Option<Decimal>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("${v:.2}"))
}

fn field(name: &str, value: String) -> DiscordField {
    DiscordField {
        name: name.to_string(),
        value,
        inline: true,
    }
}

fn build_embed(snapshot: &ProductSnapshot, product_url: &str) -> DiscordEmbed {
    let at_loss = snapshot
        .quote
        .as_ref()
        .is_some_and(|quote| quote.result.verdict == Verdict::Bad);

    let cheapest = snapshot
        .offers
        .offers
        .first()
        .map(|offer| format!("{} ({})", offer.seller_name, money(offer.total_price())))
        .unwrap_or_else(|| "no offers".to_string());

    let mut fields = vec![
        field(
            "Our rank",
            snapshot.offers.our_rank.map_or_else(
                || "not listed".to_string(),
                |rank| format!("{rank} of {}", snapshot.offers.offers.len()),
            ),
        ),
        field("Cheapest offer", cheapest),
        field("Stock", snapshot.availability.as_str().to_string()),
    ];

    if let Some(ours) = snapshot.offers.our_offer() {
        fields.push(field("Our price", money(ours.total_price())));
    }

    if let Some(quote) = &snapshot.quote {
        fields.push(field("Proposed", money(Some(quote.result.proposed_price))));
        fields.push(field(
            "Floor",
            match quote.minimum {
                MinimumViablePrice::Price(price) => money(Some(price)),
                MinimumViablePrice::NotComputable => "not computable".to_string(),
            },
        ));
        fields.push(field(
            "Verdict",
            format!("{} ({}%)", quote.result.verdict.as_str(), quote.result.margin_percent),
        ));
    }

    DiscordEmbed {
        title: format!("⚠️ {} needs attention", snapshot.sku),
        description: snapshot
            .title
            .clone()
            .unwrap_or_else(|| format!("Item {}", snapshot.item_id)),
        url: product_url.to_string(),
        color: if at_loss { LOSS_COLOR } else { ATTENTION_COLOR },
        timestamp: snapshot.checked_at.to_rfc3339(),
        fields,
    }
}

impl Clone for DiscordNotifier {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            webhook_url: self.webhook_url.clone(),
        }
    }
}

/// Local stand-ins for a Discord webhook
#[cfg(test)]
pub(crate) mod testing {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves every request with `status_line` and returns the webhook URL.
    pub(crate) async fn webhook_replying(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = Vec::new();
                let mut buf = [0u8; 4096];
                while !request_complete(&request) {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let reply = format!("{status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
                let _ = socket.write_all(reply.as_bytes()).await;
            }
        });

        format!("http://{addr}/webhook")
    }

    /// A webhook URL nothing listens on
    pub(crate) async fn unreachable_webhook() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}/webhook")
    }

    fn request_complete(request: &[u8]) -> bool {
        let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let head = String::from_utf8_lossy(&request[..end]);
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        request.len() - (end + 4) >= length
    }
}
