use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SheetsError;

pub type ParticipantName = String;

/// Column layout of the Expenses tab: ID, Description, Amount, Payer,
/// SplitBetween.
pub const EXPENSE_COLUMNS: usize = 5;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseRecord {
    pub id: i64,
    pub description: String,
    pub amount: f64,
    pub payer: ParticipantName,
    pub split_between: Vec<ParticipantName>,
}

/// An expense amount as sent by the frontend, either a JSON number or a
/// numeric string. Written through to the sheet as-is; USER_ENTERED input
/// makes both read back as the same number.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl From<AmountInput> for Value {
    fn from(amount: AmountInput) -> Value {
        match amount {
            AmountInput::Number(n) => Value::from(n),
            AmountInput::Text(s) => Value::String(s),
        }
    }
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flattens the rows of the Participants column into a list of names.
pub fn flatten_participants(rows: &[Vec<Value>]) -> Vec<ParticipantName> {
    rows.iter().flatten().map(cell_text).collect()
}

/// Builds the sheet row for a new expense. The receivers are joined with
/// commas into a single cell.
pub fn expense_row(
    id: i64,
    description: &str,
    amount: AmountInput,
    payer: &str,
    split_between: &[ParticipantName],
) -> Vec<Value> {
    vec![
        Value::from(id),
        Value::from(description),
        amount.into(),
        Value::from(payer),
        Value::from(split_between.join(",")),
    ]
}

/// Parses one data row of the Expenses tab. A row too short to have the
/// split-between cell fails the whole read, there is no per-row recovery.
pub fn expense_from_row(row: &[Value]) -> Result<ExpenseRecord, SheetsError> {
    if row.len() < EXPENSE_COLUMNS {
        return Err(SheetsError::ShortRow {
            found: row.len(),
            expected: EXPENSE_COLUMNS,
        });
    }
    let id_text = cell_text(&row[0]);
    let id = id_text.parse().map_err(|_| SheetsError::BadCell {
        column: "ID",
        kind: "integer",
        value: id_text.clone(),
    })?;
    let amount_text = cell_text(&row[2]);
    let amount = amount_text.parse().map_err(|_| SheetsError::BadCell {
        column: "Amount",
        kind: "number",
        value: amount_text.clone(),
    })?;
    Ok(ExpenseRecord {
        id,
        description: cell_text(&row[1]),
        amount,
        payer: cell_text(&row[3]),
        split_between: cell_text(&row[4]).split(',').map(str::to_owned).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expense_row_joins_receivers_with_commas() {
        let row = expense_row(
            1700000000000,
            "dinner",
            AmountInput::Number(30.0),
            "Ana",
            &["Ana".to_owned(), "Bob".to_owned()],
        );
        assert_eq!(row[4], json!("Ana,Bob"));
    }

    #[test]
    fn expense_round_trips_through_a_row() {
        let row = expense_row(
            1700000000000,
            "taxi",
            AmountInput::Number(12.5),
            "Bob",
            &["Ana".to_owned(), "Bob".to_owned(), "Cleo".to_owned()],
        );
        let record = expense_from_row(&row).unwrap();
        assert_eq!(
            record,
            ExpenseRecord {
                id: 1700000000000,
                description: "taxi".to_owned(),
                amount: 12.5,
                payer: "Bob".to_owned(),
                split_between: vec!["Ana".to_owned(), "Bob".to_owned(), "Cleo".to_owned()],
            }
        );
    }

    #[test]
    fn numeric_string_amount_parses_back_to_the_same_float() {
        let row = expense_row(
            1,
            "coffee",
            AmountInput::Text("9.99".to_owned()),
            "Ana",
            &["Ana".to_owned()],
        );
        let record = expense_from_row(&row).unwrap();
        assert_eq!(record.amount, 9.99);
    }

    #[test]
    fn short_row_is_an_error() {
        let row = vec![json!("1"), json!("dinner"), json!("30")];
        let err = expense_from_row(&row).unwrap_err();
        assert!(matches!(
            err,
            SheetsError::ShortRow {
                found: 3,
                expected: 5
            }
        ));
    }

    #[test]
    fn non_numeric_amount_is_an_error() {
        let row = vec![
            json!("1"),
            json!("dinner"),
            json!("a lot"),
            json!("Ana"),
            json!("Ana,Bob"),
        ];
        assert!(matches!(
            expense_from_row(&row).unwrap_err(),
            SheetsError::BadCell {
                column: "Amount",
                ..
            }
        ));
    }

    #[test]
    fn empty_split_cell_becomes_a_single_empty_name() {
        // Mirrors splitting an empty string on commas.
        let row = vec![json!("1"), json!("x"), json!("1"), json!("Ana"), json!("")];
        let record = expense_from_row(&row).unwrap();
        assert_eq!(record.split_between, vec!["".to_owned()]);
    }

    #[test]
    fn participants_flatten_to_a_plain_list() {
        let rows = vec![vec![json!("Ana")], vec![json!("Bob")]];
        assert_eq!(flatten_participants(&rows), vec!["Ana", "Bob"]);
        assert!(flatten_participants(&[]).is_empty());
    }

    #[test]
    fn expense_record_serializes_with_camel_case_split_between() {
        let record = ExpenseRecord {
            id: 7,
            description: "museum".to_owned(),
            amount: 4.0,
            payer: "Ana".to_owned(),
            split_between: vec!["Ana".to_owned(), "Bob".to_owned()],
        };
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "id": 7,
                "description": "museum",
                "amount": 4.0,
                "payer": "Ana",
                "splitBetween": ["Ana", "Bob"],
            })
        );
    }
}
