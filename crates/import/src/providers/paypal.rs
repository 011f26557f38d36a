//! PayPal activity exports, Italian locale.

use monjour_core::{
    Column, FieldDef, FieldType, PaymentType, Pipeline, RecordBatch, Schema, SchemaError, Step,
    Value,
};
use std::fmt;
use std::sync::Arc;

use crate::context::ImportContext;
use crate::csv::{CastOptions, CsvImporter, CsvOptions, DateFormat, NumberFormat};
use crate::importer::{ImportError, Importer, ImporterInfo};
use crate::steps::{self, ImportStep};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaypalTransactionType {
    Unknown,
    MobilePayment,
    BankTransferToPaypal,
    ExpressCheckoutPayment,
    BalanceHoldForDisputeReview,
    ReleaseBalanceHoldResolved,
    PaymentRefund,
    PreauthorizedUtilityPayment,
    WebsitePayment,
    GenericCurrencyConversion,
    AccountHoldForAuthorization,
    ReversalOfGenericAccountHold,
    UserInitiatedTransfer,
}

impl PaypalTransactionType {
    pub const ALL: [PaypalTransactionType; 13] = [
        PaypalTransactionType::Unknown,
        PaypalTransactionType::MobilePayment,
        PaypalTransactionType::BankTransferToPaypal,
        PaypalTransactionType::ExpressCheckoutPayment,
        PaypalTransactionType::BalanceHoldForDisputeReview,
        PaypalTransactionType::ReleaseBalanceHoldResolved,
        PaypalTransactionType::PaymentRefund,
        PaypalTransactionType::PreauthorizedUtilityPayment,
        PaypalTransactionType::WebsitePayment,
        PaypalTransactionType::GenericCurrencyConversion,
        PaypalTransactionType::AccountHoldForAuthorization,
        PaypalTransactionType::ReversalOfGenericAccountHold,
        PaypalTransactionType::UserInitiatedTransfer,
    ];

    pub fn as_str(self) -> &'static str {
        use PaypalTransactionType::*;
        match self {
            Unknown => "Unknown",
            MobilePayment => "Mobile payment",
            BankTransferToPaypal => "Bank transfer to PayPal account",
            ExpressCheckoutPayment => "Express Checkout payment",
            BalanceHoldForDisputeReview => "Balance hold for dispute review",
            ReleaseBalanceHoldResolved => "Release of balance hold due to dispute resolution",
            PaymentRefund => "Payment refund",
            PreauthorizedUtilityPayment => "Preauthorized utility payment",
            WebsitePayment => "Website payment",
            GenericCurrencyConversion => "Generic currency conversion",
            AccountHoldForAuthorization => "Account hold for open authorization",
            ReversalOfGenericAccountHold => "Reversal of generic account hold",
            UserInitiatedTransfer => "User-initiated transfer",
        }
    }

    /// Italian activity label as printed in the `Descrizione` column.
    pub fn from_it_label(label: &str) -> Self {
        use PaypalTransactionType::*;
        match label.trim() {
            "Pagamento da cellulare" => MobilePayment,
            "Bonifico bancario sul conto PayPal" => BankTransferToPaypal,
            "Pagamento Express Checkout" => ExpressCheckoutPayment,
            "Blocco saldo per revisione contestazione" => BalanceHoldForDisputeReview,
            "Annullamento blocco per risoluzione contestazione" => ReleaseBalanceHoldResolved,
            "Rimborso di pagamento" => PaymentRefund,
            "Pagamento preautorizzato utenza" => PreauthorizedUtilityPayment,
            "Pagamento su sito web" => WebsitePayment,
            "Conversione di valuta generica" => GenericCurrencyConversion,
            "Blocco conto per autorizzazione aperta" => AccountHoldForAuthorization,
            "Storno di blocco conto generico" => ReversalOfGenericAccountHold,
            "Trasferimento avviato dall'utente" => UserInitiatedTransfer,
            _ => Unknown,
        }
    }

    /// Holds and their releases move no money between parties.
    pub fn payment_type(self) -> Option<PaymentType> {
        use PaypalTransactionType::*;
        match self {
            PaymentRefund => Some(PaymentType::Refund),
            BankTransferToPaypal => Some(PaymentType::Deposit),
            UserInitiatedTransfer => Some(PaymentType::Withdrawal),
            ExpressCheckoutPayment | WebsitePayment => Some(PaymentType::Ecommerce),
            MobilePayment => Some(PaymentType::Transfer),
            PreauthorizedUtilityPayment => Some(PaymentType::PreauthorizedDebit),
            GenericCurrencyConversion => Some(PaymentType::InternalTransfer),
            Unknown
            | BalanceHoldForDisputeReview
            | ReleaseBalanceHoldResolved
            | AccountHoldForAuthorization
            | ReversalOfGenericAccountHold => None,
        }
    }

    pub fn field_type() -> FieldType {
        FieldType::categorical(Self::ALL.iter().map(|t| t.as_str()))
    }
}

impl fmt::Display for PaypalTransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Headers are trimmed on read, so `Lordo ` and `Tariffa ` lose their
/// trailing space.
pub const COLUMN_MAPPING: &[(&str, &str)] = &[
    ("Data", "paypal_date"),
    ("Ora", "paypal_time"),
    ("Fuso orario", "paypal_timezone"),
    ("Descrizione", "paypal_desc"),
    ("Valuta", "currency"),
    ("Lordo", "paypal_gross"),
    ("Tariffa", "paypal_fee"),
    ("Netto", "amount"),
    ("Saldo", "paypal_balance"),
    ("Codice transazione", "paypal_transaction_id"),
    ("Indirizzo email mittente", "paypal_sender_email"),
    ("Nome", "paypal_name"),
    ("Nome banca", "paypal_bank_name"),
    ("Conto bancario", "paypal_bank_account"),
    ("Importo per spedizione e imballaggio", "paypal_shipping_and_handling_amount"),
    ("IVA", "paypal_vat"),
];

pub fn schema() -> Result<Schema, SchemaError> {
    Schema::transaction().extend(
        "paypal",
        vec![
            FieldDef::new("paypal_transaction_id", FieldType::Text),
            FieldDef::new("paypal_sender_email", FieldType::Text),
            FieldDef::new("paypal_transaction_type", PaypalTransactionType::field_type()),
            FieldDef::new("paypal_gross", FieldType::Float64),
            FieldDef::new("paypal_fee", FieldType::Float64),
            FieldDef::new("paypal_balance", FieldType::Float64),
        ],
    )
}

pub fn info() -> ImporterInfo {
    ImporterInfo::new("paypal", "it_IT", "1.0").with_friendly_name("PayPal (Italia)")
}

fn text_at<'a>(batch: &'a RecordBatch, column: &str, row: usize) -> Option<&'a str> {
    batch
        .value(column, row)
        .and_then(Value::as_text)
        .filter(|s| !s.is_empty())
}

/// `date` = `paypal_date` + `paypal_time`, still as text.
pub fn combine_date_hour() -> ImportStep {
    Step::new(
        "paypal.combine_date_hour",
        |_ctx: &mut ImportContext, mut batch: RecordBatch| {
            let values = (0..batch.len())
                .map(|row| match (text_at(&batch, "paypal_date", row), text_at(&batch, "paypal_time", row)) {
                    (Some(date), Some(time)) => Value::text(format!("{date} {time}")),
                    (Some(date), None) => Value::text(date),
                    _ => Value::Null,
                })
                .collect();
            batch.set_column("date", Column::new(FieldType::Text, values)?)?;
            Ok(batch)
        },
    )
    .shared()
}

/// Labels every row with its [`PaypalTransactionType`]. Labels outside the
/// known set map to `Unknown` and leave one warning per distinct label.
pub fn map_paypal_transaction_type() -> ImportStep {
    Step::new(
        "paypal.map_paypal_transaction_type",
        |ctx: &mut ImportContext, mut batch: RecordBatch| {
            let mut unknown: Vec<String> = Vec::new();
            let values = (0..batch.len())
                .map(|row| {
                    let label = text_at(&batch, "paypal_desc", row).unwrap_or_default();
                    let ty = PaypalTransactionType::from_it_label(label);
                    if ty == PaypalTransactionType::Unknown && !unknown.iter().any(|u| u == label) {
                        unknown.push(label.to_string());
                    }
                    Value::text(ty.as_str())
                })
                .collect();
            for label in unknown {
                ctx.diagnostics
                    .warning(format!("Unknown PayPal transaction type: '{label}'"));
            }
            batch.set_column(
                "paypal_transaction_type",
                Column::new(PaypalTransactionType::field_type(), values)?,
            )?;
            Ok(batch)
        },
    )
    .shared()
}

/// Fills `desc`, `counterpart` and `payment_type` from the PayPal columns.
pub fn describe_transactions() -> ImportStep {
    Step::new(
        "paypal.describe_transactions",
        |_ctx: &mut ImportContext, mut batch: RecordBatch| {
            for row in 0..batch.len() {
                let name = text_at(&batch, "paypal_name", row).map(str::to_string);
                let label = text_at(&batch, "paypal_desc", row).map(str::to_string);
                let payment_type = text_at(&batch, "paypal_transaction_type", row)
                    .and_then(|t| {
                        PaypalTransactionType::ALL
                            .into_iter()
                            .find(|ty| ty.as_str() == t)
                    })
                    .and_then(PaypalTransactionType::payment_type);

                batch.set_value("desc", row, name.clone().or(label).into())?;
                batch.set_value("counterpart", row, name.into())?;
                batch.set_value("payment_type", row, payment_type.into())?;
            }
            Ok(batch)
        },
    )
    .shared()
}

pub fn pipeline() -> Pipeline<ImportContext, RecordBatch> {
    let options = CastOptions::new(NumberFormat::COMMA, DateFormat::day_first());
    vec![
        steps::add_archive_id(),
        steps::add_account_id(),
        steps::create_deterministic_index(),
        steps::rename_columns(COLUMN_MAPPING),
        combine_date_hour(),
        steps::cast_to_account_schema(options),
        map_paypal_transaction_type(),
        describe_transactions(),
        steps::add_currency_info(),
        steps::remove_unused_columns(),
        steps::warn_if_empty(),
    ]
}

pub fn importer() -> Result<Arc<dyn Importer>, ImportError> {
    Ok(Arc::new(
        CsvImporter::new(info(), CsvOptions::default(), pipeline())
            .with_date_column("Data", DateFormat::day_first()),
    ))
}
