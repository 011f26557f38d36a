//! Unicredit it_IT statement exports (`;`-separated, `1.234,56` amounts).
//!
//! The `Descrizione` column packs several fields behind a 23-character
//! transaction id; the template parser splits it into a
//! [`UnicreditCategory`] plus named fields.

use chrono::NaiveDate;
use monjour_core::{
    FieldDef, FieldType, PaymentType, Pipeline, RecordBatch, Schema, SchemaError, Step, Value,
};
use monjour_parser::{normalize_separators, ParsedText, TemplateParser};
use serde_json::json;
use std::fmt;
use std::sync::Arc;

use crate::context::ImportContext;
use crate::csv::{CastOptions, CsvImporter, CsvOptions, DateFormat, NumberFormat};
use crate::importer::{ImportError, Importer, ImporterInfo};
use crate::steps::{self, ImportStep};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnicreditCategory {
    Unknown,
    InterestFees,
    CommissionsFees,
    FixedMonthlyCost,
    Taxes,
    Payment,
    OtherPayments,
    OutgoingTransfer,
    SepaDirectDebit,
    Ecommerce,
    PhoneRecharge,
    InsurancePremium,
    IncomingTransfer,
    AccountRecharge,
    MiscCredits,
}

impl UnicreditCategory {
    pub const ALL: [UnicreditCategory; 15] = [
        UnicreditCategory::Unknown,
        UnicreditCategory::InterestFees,
        UnicreditCategory::CommissionsFees,
        UnicreditCategory::FixedMonthlyCost,
        UnicreditCategory::Taxes,
        UnicreditCategory::Payment,
        UnicreditCategory::OtherPayments,
        UnicreditCategory::OutgoingTransfer,
        UnicreditCategory::SepaDirectDebit,
        UnicreditCategory::Ecommerce,
        UnicreditCategory::PhoneRecharge,
        UnicreditCategory::InsurancePremium,
        UnicreditCategory::IncomingTransfer,
        UnicreditCategory::AccountRecharge,
        UnicreditCategory::MiscCredits,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UnicreditCategory::Unknown => "Unknown",
            UnicreditCategory::InterestFees => "Interest/Fees",
            UnicreditCategory::CommissionsFees => "Commissions/Fees",
            UnicreditCategory::FixedMonthlyCost => "Fixed Monthly Cost",
            UnicreditCategory::Taxes => "Taxes",
            UnicreditCategory::Payment => "Payment",
            UnicreditCategory::OtherPayments => "Other Payments",
            UnicreditCategory::OutgoingTransfer => "Outgoing Transfer",
            UnicreditCategory::SepaDirectDebit => "SEPA Direct Debit",
            UnicreditCategory::Ecommerce => "ECommerce",
            UnicreditCategory::PhoneRecharge => "Phone Recharge",
            UnicreditCategory::InsurancePremium => "Insurance Premium",
            UnicreditCategory::IncomingTransfer => "Incoming Transfer",
            UnicreditCategory::AccountRecharge => "Account Recharge",
            UnicreditCategory::MiscCredits => "Miscellaneous Credits",
        }
    }

    pub fn field_type() -> FieldType {
        FieldType::categorical(Self::ALL.iter().map(|c| c.as_str()))
    }
}

impl fmt::Display for UnicreditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub const COLUMN_MAPPING: &[(&str, &str)] = &[
    ("Data Registrazione", "unicredit_registration_date"),
    ("Data valuta", "date"),
    ("Descrizione", "unicredit_original_desc"),
    ("Importo (EUR)", "amount"),
];

const DATE_SOURCE_COLUMN: &str = "Data valuta";

/// Length of the ` {15 digits},{6 digits}` prefix of every description.
const ID_PREFIX_LEN: usize = 23;

pub fn schema() -> Result<Schema, SchemaError> {
    Schema::transaction().extend(
        "unicredit",
        vec![
            FieldDef::new("unicredit_registration_date", FieldType::Timestamp),
            FieldDef::new("unicredit_id", FieldType::Text),
            FieldDef::new("unicredit_category", UnicreditCategory::field_type()),
            FieldDef::new("unicredit_original_desc", FieldType::Text),
            FieldDef::new("unicredit_original_date", FieldType::Timestamp),
        ],
    )
}

pub fn info() -> ImporterInfo {
    ImporterInfo::new("unicredit", "it_IT", "1.0").with_friendly_name("Unicredit (Italia)")
}

/// Description parser, cases ordered most specific first.
pub fn description_parser() -> Result<TemplateParser<UnicreditCategory>, ImportError> {
    use UnicreditCategory as C;

    let mut p = TemplateParser::new();
    p.define_class("unic_id", r"\d{15},\d{6}")?
        .define_class("ecommerce", "E-Commerce")?
        .define_class("date", r"\d{2}/\d{2}/\d{4}")?
        .define_class("card", r"\d{4}")?
        // anything up to a run of three spaces
        .define_class("str", r"[^\s]+(?:\s\s?[^\s]+)*")?;

    p.add_case(C::InterestFees, fields(&[r"COMPETENZE \(INTERESSI/ONERI\)"], true))
        .add_case(C::CommissionsFees, fields(&["COMMISSIONI - PROVVIGIONI - SPESE"], true))
        .add_case(C::FixedMonthlyCost, fields(&["MY GENIUS  COSTO FISSO MESE DI {month:str}"], true))
        .add_case(C::Taxes, fields(&["IMPOSTA"], true))
        .add_case(C::InsurancePremium, fields(&["PAGAMENTO PREMIO ASSICURAZIONE"], true))
        .add_case(
            C::Payment,
            fields(
                &[
                    r"PAGAMENTO {ecommerce}?{payment_provider:str}?\s*del {original_date:date}",
                    r"CARTA \*{card}",
                    "DI {currency:str}",
                    "{amount:str}",
                    "{counterpart:str}",
                    "{location:str}",
                ],
                false,
            ),
        )
        .add_case(
            C::SepaDirectDebit,
            fields(
                &[
                    "ADDEBITO SEPA DD PER FATTURA A VOSTRO CARICO",
                    "{mandate:str}",
                    "{creditor_id:str}",
                    "{counterpart:str}",
                ],
                true,
            ),
        )
        .add_case(C::OtherPayments, fields(&["PAGAMENTI DIVERSI"], true))
        .add_case(C::OutgoingTransfer, fields(&["DISPOSIZIONE DI BONIFICO"], true))
        .add_case(
            C::PhoneRecharge,
            fields(&["RICARICA TELEFONICA SERVIZIO INTERNET BANKING"], true),
        )
        .add_case(
            C::IncomingTransfer,
            fields(
                &[concat!(
                    r"BONIFICO A VOSTRO FAVORE .*DA\s+{counterpart:str}.+PER\s+{subject:str}",
                    r".*TRN\s+{trn:str}.*(?:VA\s+{iban:str})?"
                )],
                true,
            ),
        )
        .add_case(C::AccountRecharge, fields(&["RICARICA CONTO"], true))
        .add_case(C::MiscCredits, fields(&["ACCREDITI VARI"], true))
        .add_case(C::Unknown, " {unic_id}.*");
    p.build()?;
    Ok(p)
}

/// Joins the id prefix and `parts` with the three-space field separator.
fn fields(parts: &[&str], allow_extras: bool) -> String {
    let mut pattern = std::iter::once(" {unic_id}")
        .chain(parts.iter().copied())
        .collect::<Vec<_>>()
        .join(r"\s\s\s+");
    if allow_extras {
        pattern.push_str(".*");
    }
    pattern
}

/// Classifies every row and fills the fields the description carries.
///
/// A row no case matches means the file is not a Unicredit export; that
/// aborts the import with the CSV row and the text.
pub fn add_unicredit_category(parser: TemplateParser<UnicreditCategory>) -> ImportStep {
    Step::new(
        "unicredit.add_unicredit_category",
        move |ctx: &mut ImportContext, batch: RecordBatch| {
            Ok(categorize(&parser, ctx, batch)?)
        },
    )
    .shared()
}

fn categorize(
    parser: &TemplateParser<UnicreditCategory>,
    ctx: &mut ImportContext,
    mut batch: RecordBatch,
) -> Result<RecordBatch, ImportError> {
    for row in 0..batch.len() {
        let raw = batch
            .value("unicredit_original_desc", row)
            .and_then(Value::as_text)
            .unwrap_or_default();
        let desc = normalize_separators(raw, 3, "   ");
        let Some(parsed) = parser.parse(&desc)? else {
            let csv_row = batch
                .value("csv_prev_index", row)
                .map_or_else(|| row.to_string(), ToString::to_string);
            return Err(ImportError::InvalidFile(format!(
                "Invalid Unicredit transaction: (csv_row: {csv_row}) {desc}"
            )));
        };
        let tail = desc.get(ID_PREFIX_LEN..).unwrap_or_default().trim_start().to_string();

        if parsed.label == UnicreditCategory::Unknown {
            let date = batch.value("date", row).map(ToString::to_string).unwrap_or_default();
            let amount = batch.value("amount", row).map(ToString::to_string).unwrap_or_default();
            ctx.diagnostics
                .debug(format!("Unknown transaction: {date} {amount} {tail}"));
        }

        for (column, value) in row_updates(&parsed, &tail) {
            batch.set_value(column, row, value)?;
        }
    }
    Ok(batch)
}

/// Cells a parsed description fills in, always including the category.
fn row_updates(parsed: &ParsedText<UnicreditCategory>, tail: &str) -> Vec<(&'static str, Value)> {
    use UnicreditCategory as C;

    let get = |name: &str| Value::from(parsed.get(name));
    let mut category = parsed.label;
    let mut updates = vec![
        ("unicredit_id", get("unic_id")),
        ("unicredit_original_desc", Value::text(tail)),
    ];

    match parsed.label {
        C::FixedMonthlyCost => {
            let month = parsed.get("month").unwrap_or_default();
            updates.push(("desc", Value::text(format!("Unicredit monthly cost for {month}"))));
        }
        C::Payment => {
            let payment_type = if parsed.get("ecommerce").is_some() {
                category = C::Ecommerce;
                PaymentType::Ecommerce
            } else {
                PaymentType::CardPayment
            };
            let details = json!({ "card": parsed.get("card"), "provider": parsed.get("payment_provider") });
            let extra = json!({
                "original_amount": parsed.get("amount"),
                "original_currency": parsed.get("currency"),
            });
            let original_date = parsed
                .get("original_date")
                .and_then(|d| NaiveDate::parse_from_str(d, "%d/%m/%Y").ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0));
            updates.extend([
                ("payment_type", payment_type.into()),
                ("payment_type_details", Value::text(details.to_string())),
                ("extra", Value::text(extra.to_string())),
                ("counterpart", get("counterpart")),
                // card and direct-debit rows carry no memo of their own; the
                // merchant doubles as the description
                ("desc", get("counterpart")),
                ("location", get("location")),
                ("unicredit_original_date", original_date.into()),
            ]);
        }
        C::SepaDirectDebit => updates.extend([
            ("payment_type", PaymentType::PreauthorizedDebit.into()),
            ("counterpart", get("counterpart")),
            // same as card payments
            ("desc", get("counterpart")),
        ]),
        C::OutgoingTransfer => updates.extend([
            ("payment_type", PaymentType::Transfer.into()),
            ("desc", Value::text("Outgoing transfer")),
        ]),
        C::IncomingTransfer => {
            let counterpart = parsed.get("counterpart").unwrap_or_default();
            updates.extend([
                ("payment_type", PaymentType::Transfer.into()),
                ("counterpart", Value::text(counterpart)),
                ("desc", Value::text(format!("Incoming transfer from {counterpart}"))),
            ]);
        }
        _ => updates.push(("desc", Value::text(tail))),
    }

    updates.push(("unicredit_category", Value::text(category.as_str())));
    updates
}

pub fn pipeline(parser: TemplateParser<UnicreditCategory>) -> Pipeline<ImportContext, RecordBatch> {
    vec![
        steps::add_archive_id(),
        steps::add_account_id(),
        steps::create_deterministic_index(),
        steps::rename_columns(COLUMN_MAPPING),
        steps::cast_to_account_schema(CastOptions::new(NumberFormat::COMMA, DateFormat::day_first())),
        steps::add_currency_info(),
        add_unicredit_category(parser),
        steps::remove_unused_columns(),
        steps::warn_if_empty(),
    ]
}

pub fn importer() -> Result<Arc<dyn Importer>, ImportError> {
    let parser = description_parser()?;
    // descriptions start with a significant space
    let csv = CsvOptions {
        trim: false,
        ..CsvOptions::default().with_delimiter(b';')
    };
    Ok(Arc::new(
        CsvImporter::new(info(), csv, pipeline(parser))
            .with_date_column(DATE_SOURCE_COLUMN, DateFormat::day_first()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use monjour_archive::ArchiveId;
    use monjour_core::{AccountId, AccountInfo, DateRange, ImmediateExecutor, Severity};

    const ECOMMERCE: &str = " 123456789012345,000001   PAGAMENTO E-Commerce del 02/01/2024   CARTA *1234   DI EUR   12,50   AMAZON EU   LUXEMBOURG";
    const INCOMING: &str = " 123456789012345,000002   BONIFICO A VOSTRO FAVORE BONIFICO SEPA DA   MARIO ROSSI   PER   STIPENDIO   TRN   ABC123";
    const MONTHLY: &str = " 123456789012345,000003   MY GENIUS  COSTO FISSO MESE DI GENNAIO";

    fn statement(descriptions: &[&str]) -> Vec<u8> {
        let mut out = String::from("Data Registrazione;Data valuta;Descrizione;Importo (EUR)\n");
        for (i, desc) in descriptions.iter().enumerate() {
            let day = i + 3;
            out.push_str(&format!("{day:02}/01/2024;{day:02}/01/2024;{desc};-1.234,50\n"));
        }
        out.into_bytes()
    }

    fn ctx() -> ImportContext {
        let account = AccountInfo::new("unicredit", "unicredit", "it_IT", "EUR")
            .with_schema(schema().unwrap());
        ImportContext::new(
            account,
            ArchiveId::new(&AccountId::from("unicredit"), "abc"),
            DateRange::for_month_year(1, 2024).unwrap(),
            "estratto.csv",
            &info().id,
        )
        .unwrap()
    }

    fn parse(text: &str) -> ParsedText<UnicreditCategory> {
        let parser = description_parser().unwrap();
        parser
            .parse(&normalize_separators(text, 3, "   "))
            .unwrap()
            .unwrap()
    }

    // ── description parser ───────────────────────────────────────────────────

    #[test]
    fn ecommerce_payment_fields() {
        let parsed = parse(ECOMMERCE);
        assert_eq!(parsed.label, UnicreditCategory::Payment);
        assert_eq!(parsed.get("ecommerce"), Some("E-Commerce"));
        assert_eq!(parsed.get("payment_provider"), None);
        assert_eq!(parsed.get("card"), Some("1234"));
        assert_eq!(parsed.get("amount"), Some("12,50"));
        assert_eq!(parsed.get("counterpart"), Some("AMAZON EU"));
        assert_eq!(parsed.get("location"), Some("LUXEMBOURG"));
    }

    #[test]
    fn card_payment_with_provider_and_wide_separators() {
        let parsed = parse(
            " 123456789012345,000004      PAGAMENTO SUMUP del 04/01/2024    CARTA *9876     DI EUR   3,20   BAR CENTRALE      MILANO",
        );
        assert_eq!(parsed.label, UnicreditCategory::Payment);
        assert_eq!(parsed.get("ecommerce"), None);
        assert_eq!(parsed.get("payment_provider"), Some("SUMUP"));
        assert_eq!(parsed.get("counterpart"), Some("BAR CENTRALE"));
        assert_eq!(parsed.get("location"), Some("MILANO"));
    }

    #[test]
    fn fixed_cases_win_over_unknown() {
        assert_eq!(parse(MONTHLY).get("month"), Some("GENNAIO"));
        assert_eq!(
            parse(" 123456789012345,000005   IMPOSTA   DI BOLLO").label,
            UnicreditCategory::Taxes
        );
        assert_eq!(parse(INCOMING).get("counterpart"), Some("MARIO ROSSI"));
        assert_eq!(
            parse(" 123456789012345,000006   QUALCOSA DI NUOVO").label,
            UnicreditCategory::Unknown
        );
    }

    #[test]
    fn narrow_separators_fall_through_to_unknown() {
        let parser = description_parser().unwrap();
        let squeezed = ECOMMERCE.replace("   ", "  ");
        let parsed = parser.parse(&squeezed).unwrap().unwrap();
        assert_eq!(parsed.label, UnicreditCategory::Unknown);
    }

    #[test]
    fn categories_are_valid_categorical_values() {
        let ty = UnicreditCategory::field_type();
        for category in UnicreditCategory::ALL {
            assert!(ty.accepts(&Value::text(category.as_str())));
        }
    }

    // ── import ───────────────────────────────────────────────────────────────

    #[test]
    fn statement_imports_with_categories() {
        let importer = importer().unwrap();
        let mut c = ctx();
        let batch = importer
            .import_file(&mut c, &statement(&[ECOMMERCE, INCOMING, MONTHLY]), &ImmediateExecutor)
            .unwrap();

        assert_eq!(batch.len(), 3);
        assert!(batch.conforms_to(&schema().unwrap()));
        assert_eq!(batch.value("amount", 0), Some(&Value::Float(-1234.5)));
        assert_eq!(batch.value("unicredit_category", 0), Some(&Value::text("ECommerce")));
        assert_eq!(batch.value("payment_type", 0), Some(&Value::text("Ecommerce")));
        assert_eq!(batch.value("desc", 0), Some(&Value::text("AMAZON EU")));
        assert_eq!(batch.value("unicredit_id", 0), Some(&Value::text("123456789012345,000001")));
        let original = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(batch.value("unicredit_original_date", 0), Some(&Value::Timestamp(original)));
        let tail = batch.value("unicredit_original_desc", 0).and_then(Value::as_text).unwrap();
        assert!(tail.starts_with("PAGAMENTO E-Commerce"));

        assert_eq!(batch.value("desc", 1), Some(&Value::text("Incoming transfer from MARIO ROSSI")));
        assert_eq!(batch.value("payment_type", 1), Some(&Value::text("Transfer")));
        assert_eq!(batch.value("desc", 2), Some(&Value::text("Unicredit monthly cost for GENNAIO")));
        assert_eq!(batch.value("currency", 2), Some(&Value::text("EUR")));
        assert_eq!(c.diagnostics.count(Severity::Error), 0);
    }

    #[test]
    fn direct_debit_uses_creditor_as_description() {
        const DEBIT: &str = " 123456789012345,000004   ADDEBITO SEPA DD PER FATTURA A VOSTRO CARICO   MANDATO 42   IT00ZZZ   ENEL ENERGIA";
        let importer = importer().unwrap();
        let mut c = ctx();
        let batch = importer
            .import_file(&mut c, &statement(&[DEBIT]), &ImmediateExecutor)
            .unwrap();
        assert_eq!(batch.value("unicredit_category", 0), Some(&Value::text("SEPA Direct Debit")));
        assert_eq!(batch.value("payment_type", 0), Some(&Value::text("PreauthorizedDebit")));
        assert_eq!(batch.value("counterpart", 0), Some(&Value::text("ENEL ENERGIA")));
        assert_eq!(batch.value("desc", 0), Some(&Value::text("ENEL ENERGIA")));
    }

    #[test]
    fn unknown_rows_leave_a_debug_note() {
        let importer = importer().unwrap();
        let mut c = ctx();
        let batch = importer
            .import_file(
                &mut c,
                &statement(&[" 123456789012345,000006   QUALCOSA DI NUOVO"]),
                &ImmediateExecutor,
            )
            .unwrap();
        assert_eq!(batch.value("unicredit_category", 0), Some(&Value::text("Unknown")));
        assert_eq!(batch.value("desc", 0), Some(&Value::text("QUALCOSA DI NUOVO")));
        assert_eq!(c.diagnostics.count(Severity::Debug), 1);
    }

    #[test]
    fn unparseable_description_rejects_the_file() {
        let importer = importer().unwrap();
        let err = importer
            .import_file(&mut ctx(), &statement(&["not a unicredit row"]), &ImmediateExecutor)
            .unwrap_err();
        let message = err.invalid_file().unwrap();
        assert!(message.contains("csv_row: 0"));
        assert!(message.contains("not a unicredit row"));
    }

    #[test]
    fn date_range_comes_from_value_dates() {
        let importer = importer().unwrap();
        let range = importer
            .try_infer_date_range(&statement(&[ECOMMERCE, INCOMING, MONTHLY]), Some("estratto.csv"))
            .unwrap();
        assert_eq!(range.start.date(), NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(range.end.date(), NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
    }
}
