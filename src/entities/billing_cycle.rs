//! Billing cycles: one invoicing period's computed charges for a
//! global license

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::core::error::ApiResult;
use crate::core::schema::{ColumnType, TableSchema, col, index, references, unique};
use crate::core::validation::{Operation, StatusFlow, ValidationConfig, filters, validators};
use crate::entities::{AMOUNT_TOLERANCE, amounts_match};
use crate::impl_record;
use crate::server::rest::{AppState, filtered, resource_routes};

pub const CYCLE_STATUSES: &[&str] = &["open", "invoiced", "paid", "overdue", "void"];

/// open → invoiced|void, invoiced → paid|overdue|void, overdue → paid|void;
/// paid and void are terminal
pub const CYCLE_STATUS_FLOW: StatusFlow = &[
    ("open", &["invoiced", "void"]),
    ("invoiced", &["paid", "overdue", "void"]),
    ("overdue", &["paid", "void"]),
];

impl_record!(
    BillingCycle,
    "billing_cycle",
    "billing_cycles",
    {
        license_guid: i64,
        period_start: String,
        period_end: String,
        /// Seats billed for the period
        seat_count: i64,
        net_amount: f64,
        tax_rate_percent: f64,
        tax_amount: f64,
        gross_amount: f64,
        currency_code: String,
        status: String,
        #[serde(default)]
        invoiced_on: Option<String>,
        #[serde(default)]
        due_on: Option<String>,
        #[serde(default)]
        paid_on: Option<String>,
    }
);

fn schema() -> TableSchema {
    TableSchema {
        table: "billing_cycles",
        guid_offset: 230_000,
        natural_key: None,
        searchable: &["status", "period_start", "currency_code"],
        columns: vec![
            col("license_guid", ColumnType::BigInt, false),
            col("period_start", ColumnType::Date, false),
            col("period_end", ColumnType::Date, false),
            col("seat_count", ColumnType::Integer, false),
            col("net_amount", ColumnType::Double, false),
            col("tax_rate_percent", ColumnType::Double, false),
            col("tax_amount", ColumnType::Double, false),
            col("gross_amount", ColumnType::Double, false),
            col("currency_code", ColumnType::Text, false),
            col("status", ColumnType::Text, false),
            col("invoiced_on", ColumnType::Date, true),
            col("due_on", ColumnType::Date, true),
            col("paid_on", ColumnType::Date, true),
        ],
        uniques: vec![unique(
            "uq_billing_cycles_license_period",
            &["license_guid", "period_start"],
        )],
        indexes: vec![
            index("idx_billing_cycles_license", &["license_guid"]),
            index("idx_billing_cycles_status", &["status"]),
        ],
        foreign_keys: vec![
            references("license_guid", "global_licenses", "guid"),
            references("currency_code", "currencies", "iso_code"),
        ],
    }
}

fn validation(op: Operation) -> ValidationConfig {
    let config = ValidationConfig::new("billing_cycle")
        .rule("license_guid", validators::integer())
        .rule("period_start", validators::date_format("%Y-%m-%d"))
        .rule("period_end", validators::date_format("%Y-%m-%d"))
        .rule("seat_count", validators::integer())
        .rule("seat_count", validators::non_negative())
        .filter("net_amount", filters::round_decimals(2))
        .rule("net_amount", validators::non_negative())
        .rule("tax_rate_percent", validators::range(0.0, 100.0))
        .filter("tax_amount", filters::round_decimals(2))
        .rule("tax_amount", validators::non_negative())
        .filter("gross_amount", filters::round_decimals(2))
        .rule("gross_amount", validators::non_negative())
        .filter("currency_code", filters::uppercase())
        .rule("currency_code", validators::matches(r"^[A-Z]{3}$"))
        .rule(
            "status",
            validators::in_list(CYCLE_STATUSES.iter().map(|s| s.to_string()).collect()),
        )
        .rule("invoiced_on", validators::date_format("%Y-%m-%d"))
        .rule("due_on", validators::date_format("%Y-%m-%d"))
        .rule("paid_on", validators::date_format("%Y-%m-%d"))
        .check("period_end", |row| {
            let start = row.get("period_start").and_then(Value::as_str);
            let end = row.get("period_end").and_then(Value::as_str);
            match (start, end) {
                (Some(start), Some(end)) if end <= start => {
                    Err("period_end must be after period_start".to_string())
                }
                _ => Ok(()),
            }
        })
        .check("gross_amount", |row| {
            let net = row.get("net_amount").and_then(Value::as_f64);
            let tax = row.get("tax_amount").and_then(Value::as_f64);
            let gross = row.get("gross_amount").and_then(Value::as_f64);
            match (net, tax, gross) {
                (Some(net), Some(tax), Some(gross)) if !amounts_match(gross, net + tax) => Err(
                    format!(
                        "gross_amount must equal net_amount + tax_amount within {}",
                        AMOUNT_TOLERANCE
                    ),
                ),
                _ => Ok(()),
            }
        })
        .check("tax_amount", |row| {
            let net = row.get("net_amount").and_then(Value::as_f64);
            let rate = row.get("tax_rate_percent").and_then(Value::as_f64);
            let tax = row.get("tax_amount").and_then(Value::as_f64);
            match (net, rate, tax) {
                (Some(net), Some(rate), Some(tax))
                    if !amounts_match(tax, net * rate / 100.0) =>
                {
                    Err("tax_amount is inconsistent with net_amount and tax_rate_percent"
                        .to_string())
                }
                _ => Ok(()),
            }
        })
        .check("invoiced_on", |row| {
            let status = row.get("status").and_then(Value::as_str).unwrap_or("open");
            if matches!(status, "invoiced" | "paid" | "overdue") {
                let invoiced = row.get("invoiced_on").and_then(Value::as_str);
                let due = row.get("due_on").and_then(Value::as_str);
                if invoiced.is_none() || due.is_none() {
                    return Err(format!(
                        "status '{}' requires invoiced_on and due_on",
                        status
                    ));
                }
            }
            Ok(())
        })
        .check("paid_on", |row| {
            let status = row.get("status").and_then(Value::as_str).unwrap_or("open");
            if status == "paid" && row.get("paid_on").and_then(Value::as_str).is_none() {
                return Err("status 'paid' requires paid_on".to_string());
            }
            Ok(())
        })
        .allow_transitions("status", CYCLE_STATUS_FLOW);

    match op {
        Operation::Create => config
            .rule("license_guid", validators::required())
            .rule("period_start", validators::required())
            .rule("period_end", validators::required())
            .rule("seat_count", validators::required())
            .rule("net_amount", validators::required())
            .rule("tax_rate_percent", validators::required())
            .rule("tax_amount", validators::required())
            .rule("gross_amount", validators::required())
            .rule("currency_code", validators::required())
            .filter("status", filters::default_value(json!("open"))),
        Operation::Update => config,
    }
}

impl BillingCycle {
    pub fn with_amounts(mut self, net: f64, tax_rate_percent: f64) -> Self {
        self.net_amount = net;
        self.tax_rate_percent = tax_rate_percent;
        self.tax_amount = self.expected_tax();
        self.gross_amount = net + self.tax_amount;
        self.touch();
        self
    }

    /// Tax implied by the net amount and the rate
    pub fn expected_tax(&self) -> f64 {
        self.net_amount * self.tax_rate_percent / 100.0
    }

    /// Whether gross = net + tax and tax matches the rate, within tolerance
    pub fn amounts_reconcile(&self) -> bool {
        amounts_match(self.gross_amount, self.net_amount + self.tax_amount)
            && amounts_match(self.tax_amount, self.expected_tax())
    }

    /// Whether a payment may be taken against this cycle
    pub fn is_payable(&self) -> bool {
        matches!(self.status.as_str(), "invoiced" | "overdue")
    }

    pub fn mark_invoiced(&mut self, invoiced_on: impl Into<String>, due_on: impl Into<String>) {
        self.status = "invoiced".to_string();
        self.invoiced_on = Some(invoiced_on.into());
        self.due_on = Some(due_on.into());
        self.touch();
    }

    pub fn mark_paid(&mut self, paid_on: impl Into<String>) {
        self.status = "paid".to_string();
        self.paid_on = Some(paid_on.into());
        self.touch();
    }
}

pub fn routes() -> Router<AppState> {
    resource_routes::<BillingCycle>()
        .route("/license/{guid}", get(by_license))
        .route("/status/{status}", get(by_status))
}

async fn by_license(
    State(state): State<AppState>,
    Path(guid): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<BillingCycle>(&state, "license_guid", &guid).await
}

async fn by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> ApiResult<Json<Value>> {
    filtered::<BillingCycle>(&state, "status", &status).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::Record;

    fn cycle() -> BillingCycle {
        BillingCycle::new(
            210_001,
            "2026-03-01".to_string(),
            "2026-04-01".to_string(),
            20,
            250.0,
            20.0,
            50.0,
            300.0,
            "EUR".to_string(),
            "open".to_string(),
            None,
            None,
            None,
        )
    }

    fn payload() -> Value {
        json!({
            "license_guid": 210_001,
            "period_start": "2026-03-01",
            "period_end": "2026-04-01",
            "seat_count": 20,
            "net_amount": 250.0,
            "tax_rate_percent": 20.0,
            "tax_amount": 50.0,
            "gross_amount": 300.0,
            "currency_code": "EUR"
        })
    }

    #[test]
    fn test_amounts_reconcile() {
        assert!(cycle().amounts_reconcile());

        let mut skewed = cycle();
        skewed.gross_amount = 301.0;
        assert!(!skewed.amounts_reconcile());
    }

    #[test]
    fn test_with_amounts_recomputes() {
        let cycle = cycle().with_amounts(100.0, 19.0);
        assert!((cycle.tax_amount - 19.0).abs() < 1e-9);
        assert!((cycle.gross_amount - 119.0).abs() < 1e-9);
        assert!(cycle.amounts_reconcile());
    }

    #[test]
    fn test_invoice_then_pay() {
        let mut cycle = cycle();
        assert!(!cycle.is_payable());

        cycle.mark_invoiced("2026-04-01", "2026-04-15");
        assert!(cycle.is_payable());

        cycle.mark_paid("2026-04-10");
        assert_eq!(cycle.status, "paid");
        assert!(!cycle.is_payable());
    }

    #[test]
    fn test_create_accepts_reconciled_amounts() {
        let config = BillingCycle::validation(Operation::Create);
        let cleaned = config.apply(&payload(), Operation::Create).unwrap();
        assert!(config.check_row(&cleaned).is_ok());
        assert_eq!(cleaned["status"], json!("open"));
    }

    #[test]
    fn test_create_rejects_gross_mismatch() {
        let config = BillingCycle::validation(Operation::Create);
        let mut body = payload();
        body["gross_amount"] = json!(310.0);
        let cleaned = config.apply(&body, Operation::Create).unwrap();
        let err = config.check_row(&cleaned).unwrap_err();
        assert!(err.iter().any(|i| i.field == "gross_amount"));
    }

    #[test]
    fn test_create_rejects_tax_inconsistency() {
        let config = BillingCycle::validation(Operation::Create);
        let mut body = payload();
        // 250 * 20% is 50, not 40 — and gross kept consistent with the
        // tampered tax so only the tax-consistency rule fires
        body["tax_amount"] = json!(40.0);
        body["gross_amount"] = json!(290.0);
        let cleaned = config.apply(&body, Operation::Create).unwrap();
        let err = config.check_row(&cleaned).unwrap_err();
        assert!(err.iter().any(|i| i.field == "tax_amount"));
    }

    #[test]
    fn test_tolerance_absorbs_rounding() {
        let config = BillingCycle::validation(Operation::Create);
        let mut body = payload();
        body["gross_amount"] = json!(300.004);
        let cleaned = config.apply(&body, Operation::Create).unwrap();
        // rounded to 300.0 by the filter, reconciles exactly
        assert!(config.check_row(&cleaned).is_ok());
    }

    #[test]
    fn test_invoiced_requires_dates() {
        let config = BillingCycle::validation(Operation::Update);
        let mut row = payload();
        row["status"] = json!("invoiced");
        let err = config.check_row(&row).unwrap_err();
        assert!(err.iter().any(|i| i.field == "invoiced_on"));
    }

    #[test]
    fn test_paid_requires_paid_on() {
        let config = BillingCycle::validation(Operation::Update);
        let mut row = payload();
        row["status"] = json!("paid");
        row["invoiced_on"] = json!("2026-04-01");
        row["due_on"] = json!("2026-04-15");
        let err = config.check_row(&row).unwrap_err();
        assert!(err.iter().any(|i| i.field == "paid_on"));
    }

    #[test]
    fn test_period_ordering() {
        let config = BillingCycle::validation(Operation::Create);
        let mut body = payload();
        body["period_end"] = json!("2026-03-01");
        let cleaned = config.apply(&body, Operation::Create).unwrap();
        let err = config.check_row(&cleaned).unwrap_err();
        assert!(err.iter().any(|i| i.field == "period_end"));
    }

    #[test]
    fn test_status_flow() {
        let config = BillingCycle::validation(Operation::Update);
        assert!(config
            .check_transition(&json!({"status": "open"}), &json!({"status": "invoiced"}))
            .is_ok());
        assert!(config
            .check_transition(&json!({"status": "open"}), &json!({"status": "paid"}))
            .is_err());
        assert!(config
            .check_transition(&json!({"status": "void"}), &json!({"status": "open"}))
            .is_err());
    }

    #[test]
    fn test_schema_identity() {
        let schema = BillingCycle::table();
        assert_eq!(schema.guid_offset, 230_000);
        assert_eq!(schema.uniques[0].columns, ["license_guid", "period_start"]);
    }
}
