//! Text output formatting.

use basketeer_core::{BasketSummary, ResolvedItem, ResolvedVenue};
use chrono::Utc;

use super::structured::{AuthStatusOutput, ItemOutput, MenuOutput, SourceOutput, VenueOutput};

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    // ========================================================================
    // Menu and items
    // ========================================================================

    /// Formats a menu as one line per item.
    pub fn format_menu(&self, menu: &MenuOutput) -> String {
        let mut lines = vec![format!(
            "{} {}",
            self.bold(&menu.venue),
            self.dim(&format!("({} items)", menu.items.len()))
        )];
        if menu.items.is_empty() {
            lines.push(self.dim("No items found"));
        }
        for item in &menu.items {
            lines.push(format!(
                "  {:<40} {:>12}  {}",
                item.name.as_deref().unwrap_or("(unnamed)"),
                self.price(item.price, item.currency.as_deref()),
                self.dim(&item.id)
            ));
        }
        lines.join("\n")
    }

    /// Formats one item with its option groups and sources.
    pub fn format_item(&self, output: &ItemOutput) -> String {
        let item = &output.value;
        let mut lines = vec![
            self.bold(item.name.as_deref().unwrap_or(&item.id)),
            format!("Price:   {}", self.price(item.price, item.currency.as_deref())),
        ];
        if !output.complete {
            lines.push(self.yellow("Incomplete: some fields could not be resolved"));
        }
        lines.extend(self.option_groups(item));
        lines.push(self.sources(&output.sources));
        lines.join("\n")
    }

    fn option_groups(&self, item: &ResolvedItem) -> Vec<String> {
        let mut lines = Vec::new();
        for group in &item.option_groups {
            let bounds = match (group.min, group.max) {
                (Some(min), Some(max)) => format!(" (choose {min}-{max})"),
                (Some(min), None) => format!(" (at least {min})"),
                (None, Some(max)) => format!(" (up to {max})"),
                (None, None) => String::new(),
            };
            lines.push(format!(
                "{}{}",
                group.name.as_deref().unwrap_or(&group.id),
                self.dim(&bounds)
            ));
            for value in &group.values {
                let price = value
                    .price
                    .filter(|p| *p > 0)
                    .map(|p| format!(" +{}", minor_units(p)))
                    .unwrap_or_default();
                lines.push(format!(
                    "  - {}{price}",
                    value.name.as_deref().unwrap_or(&value.id)
                ));
            }
        }
        lines
    }

    /// Formats venue information.
    pub fn format_venue(&self, output: &VenueOutput) -> String {
        let venue: &ResolvedVenue = &output.value;
        let mut lines = vec![self.bold(venue.name.as_deref().unwrap_or(&venue.slug))];
        let fields = [
            ("Slug", Some(venue.slug.as_str())),
            ("Id", venue.id.as_deref()),
            ("Currency", venue.currency.as_deref()),
            ("Country", venue.country.as_deref()),
            ("Address", venue.address.as_deref()),
        ];
        for (label, value) in fields {
            if let Some(value) = value {
                lines.push(format!("{:<9} {value}", format!("{label}:")));
            }
        }
        if let Some(online) = venue.online {
            let status = if online {
                self.green("online")
            } else {
                self.red("offline")
            };
            lines.push(format!("Status:   {status}"));
        }
        lines.push(self.sources(&output.sources));
        lines.join("\n")
    }

    fn sources(&self, sources: &[SourceOutput]) -> String {
        let trail: Vec<String> = sources
            .iter()
            .map(|s| format!("{} {}", s.source, s.status))
            .collect();
        self.dim(&format!("Sources: {}", trail.join(", ")))
    }

    // ========================================================================
    // Baskets
    // ========================================================================

    /// Formats the basket list.
    pub fn format_baskets(&self, baskets: &[BasketSummary]) -> String {
        if baskets.is_empty() {
            return self.dim("No baskets");
        }
        baskets
            .iter()
            .map(|b| self.basket_line(b))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Formats a removed basket.
    pub fn format_removed(&self, basket: &BasketSummary) -> String {
        format!("{} {}", self.green("Removed"), self.basket_line(basket))
    }

    fn basket_line(&self, basket: &BasketSummary) -> String {
        let count = basket.item_count();
        format!(
            "{}  {}  {} item{}  {}",
            self.bold(&basket.id),
            basket.venue.as_deref().unwrap_or("-"),
            count,
            if count == 1 { "" } else { "s" },
            self.price(basket.total, basket.currency.as_deref())
        )
    }

    // ========================================================================
    // Auth
    // ========================================================================

    /// Formats credential status.
    pub fn format_auth_status(&self, status: &AuthStatusOutput) -> String {
        let headline = if status.authenticated {
            self.green("Authenticated")
        } else {
            self.yellow("Not authenticated")
        };
        let yes_no = |b: bool| if b { "yes" } else { "no" };
        let mut lines = vec![
            headline,
            format!("Token source:  {}", status.token_source),
            format!("Bearer token:  {}", yes_no(status.bearer_token)),
            format!("Refresh token: {}", yes_no(status.refresh_token)),
            format!("Cookies:       {}", status.cookies),
        ];
        if let Some(expires_at) = status.expires_at {
            let when = expires_at.format("%Y-%m-%d %H:%M:%S UTC").to_string();
            let line = if status.expired {
                self.red(&format!("expired {when}"))
            } else {
                let minutes = (expires_at - Utc::now()).num_minutes();
                format!("{when} {}", self.dim(&format!("(in {minutes} min)")))
            };
            lines.push(format!("Expires:       {line}"));
        }
        lines.push(format!("Store:         {}", status.store));
        lines.join("\n")
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Formats a price in minor units.
    pub fn price(&self, price: Option<i64>, currency: Option<&str>) -> String {
        match (price, currency) {
            (Some(p), Some(c)) => format!("{} {c}", minor_units(p)),
            (Some(p), None) => minor_units(p),
            (None, _) => self.dim("-"),
        }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.use_colors {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }
}

/// Renders minor units with two decimals.
fn minor_units(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
