use super::{CsvImport, CsvRow, ParsedRow, RowError};
use crate::entities::customer_issue::DEFAULT_ISSUE_STATUS;
use crate::entities::CustomerIssue;

/// CSV import profile for customer issues.
///
/// Expected headers: customer_id, code_contrat, client_type, client_region,
/// client_categorie, incident_title, churn_risk. Every value may be blank;
/// a fully blank row still produces a record. Only malformed numeric text
/// fails a row.
pub struct CustomerIssueCsv;

impl CustomerIssueCsv {
    fn numeric(row: &CsvRow<'_>, field: &str) -> Result<Option<f64>, RowError> {
        row.parse_f64(field)
            .map_err(|_| row.error(format!("Invalid {} value", field)))
    }
}

impl CsvImport for CustomerIssueCsv {
    type Record = CustomerIssue;

    fn entity_label(&self) -> &'static str {
        "customer issues"
    }

    fn parse_row(&self, row: &CsvRow<'_>) -> Result<ParsedRow<CustomerIssue>, RowError> {
        Ok(ParsedRow::new(CustomerIssue {
            customer_id: Self::numeric(row, "customer_id")?,
            code_contrat: Self::numeric(row, "code_contrat")?,
            client_type: Self::numeric(row, "client_type")?,
            client_region: Self::numeric(row, "client_region")?,
            client_categorie: Self::numeric(row, "client_categorie")?,
            incident_title: row.text("incident_title").map(str::to_string),
            churn_risk: Self::numeric(row, "churn_risk")?,
            // CSV imports land unsent regardless of any status column
            status: DEFAULT_ISSUE_STATUS.to_string(),
        }))
    }
}
