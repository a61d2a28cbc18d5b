use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{get, post, web, App, HttpResponse, HttpServer};
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::error;

mod auth;
mod config;
mod error;
mod schemas;
mod sheets;

use config::Config;
use error::SheetsError;
use schemas::{expense_from_row, expense_row, flatten_participants, AmountInput, ExpenseRecord};
use sheets::{
    SheetsApi, SheetsClient, ValueRange, EXPENSES_APPEND_RANGE, EXPENSES_DATA_RANGE,
    EXPENSES_HEADER_RANGE, PARTICIPANTS_RANGE, PARTICIPANTS_START,
};

#[derive(Deserialize)]
struct CreateTripJson {
    participants: Vec<String>,
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpreadsheetIdJson {
    spreadsheet_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddExpenseJson {
    spreadsheet_id: String,
    description: String,
    amount: AmountInput,
    payer: String,
    split_between: Vec<String>,
}

fn failure(message: &str) -> HttpResponse {
    HttpResponse::InternalServerError().json(json!({ "error": message }))
}

#[post("/create-trip")]
async fn create_trip(
    sheets: web::Data<dyn SheetsApi>,
    json: web::Json<CreateTripJson>,
) -> HttpResponse {
    let title = format!("SplitBills Trip - {}", Local::now().format("%c"));
    let result = async {
        let spreadsheet_id = sheets
            .create_spreadsheet(&title, &["Participants", "Expenses"])
            .await?;
        let data = vec![
            ValueRange {
                range: EXPENSES_HEADER_RANGE.to_owned(),
                values: vec![vec![
                    json!("ID"),
                    json!("Description"),
                    json!("Amount"),
                    json!("Payer"),
                    json!("SplitBetween"),
                ]],
            },
            ValueRange {
                range: PARTICIPANTS_START.to_owned(),
                values: json
                    .participants
                    .iter()
                    .map(|name| vec![Value::from(name.as_str())])
                    .collect(),
            },
        ];
        sheets.batch_update_values(&spreadsheet_id, data).await?;
        Ok::<_, SheetsError>(spreadsheet_id)
    }
    .await;
    match result {
        Ok(spreadsheet_id) => HttpResponse::Ok().json(SpreadsheetIdJson { spreadsheet_id }),
        Err(err) => {
            error!("error creating trip: {err}");
            failure("Failed to create trip.")
        }
    }
}

#[get("/get-participants")]
async fn get_participants(
    sheets: web::Data<dyn SheetsApi>,
    query: web::Query<SpreadsheetIdJson>,
) -> HttpResponse {
    match sheets
        .get_values(&query.spreadsheet_id, PARTICIPANTS_RANGE)
        .await
    {
        Ok(rows) => HttpResponse::Ok().json(flatten_participants(&rows)),
        Err(err) => {
            error!("error getting participants: {err}");
            failure("Failed to get participants.")
        }
    }
}

#[get("/get-expenses")]
async fn get_expenses(
    sheets: web::Data<dyn SheetsApi>,
    query: web::Query<SpreadsheetIdJson>,
) -> HttpResponse {
    let result = async {
        let rows = sheets
            .get_values(&query.spreadsheet_id, EXPENSES_DATA_RANGE)
            .await?;
        rows.iter()
            .map(|row| expense_from_row(row))
            .collect::<Result<Vec<ExpenseRecord>, SheetsError>>()
    }
    .await;
    match result {
        Ok(expenses) => HttpResponse::Ok().json(expenses),
        Err(err) => {
            error!("error getting expenses: {err}");
            failure("Failed to get expenses.")
        }
    }
}

#[post("/add-expense")]
async fn add_expense(
    sheets: web::Data<dyn SheetsApi>,
    json: web::Json<AddExpenseJson>,
) -> HttpResponse {
    let json = json.into_inner();
    let row = expense_row(
        Utc::now().timestamp_millis(),
        &json.description,
        json.amount,
        &json.payer,
        &json.split_between,
    );
    match sheets
        .append_row(&json.spreadsheet_id, EXPENSES_APPEND_RANGE, row)
        .await
    {
        Ok(()) => HttpResponse::Ok().json(json!({ "message": "Expense added successfully." })),
        Err(err) => {
            error!("error adding expense: {err}");
            failure("Failed to add expense.")
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().map_err(std::io::Error::other)?;
    let sheets: Arc<dyn SheetsApi> = Arc::new(SheetsClient::new(config.service_account.clone()));
    let sheets = web::Data::from(sheets);
    let allowed_origin = config.allowed_origin.clone();

    tracing::info!("server listening at http://localhost:{}", config.port);
    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allowed_origin(&allowed_origin)
                    .allowed_methods(["GET", "POST"])
                    .allow_any_header(),
            )
            .app_data(sheets.clone())
            .service(create_trip)
            .service(get_participants)
            .service(get_expenses)
            .service(add_expense)
    })
    .bind(("0.0.0.0", config.port))?
    .run()
    .await
}
