//! Page controller: bootstrap, form handlers, loaders and table sorting.
//!
//! DESIGN
//! ======
//! Page-level state lives in [`PageController`] instead of globals: the
//! last parts list fetched from the server, the active sort column and
//! order for the parts table, and the number of rows in the bulk-insert
//! form. Every operation takes the [`Page`] and [`InventoryApi`] it works
//! against, so the same controller drives a browser or a test fake.
//!
//! LOADING
//! =======
//! Whenever several lists are refreshed together (bootstrap, after a
//! submit) their requests are issued at once with `futures::join!` and each
//! result is rendered when all have settled. A failed load shows an error
//! message and leaves the other tables untouched.

use std::cmp::Ordering;

use futures::future::OptionFuture;
use time::Date;
use tracing::{info, warn};

use crate::api::{ApiError, InventoryApi};
use crate::dom::{
    BULK_INSERT_FORM, FormHandler, INSERT_FORM, LOW_STOCK_THRESHOLD_INPUT, MessageKind, Page, PartsTable,
    SubmitEvent, USAGE_FORM, USED_DATE_INPUT,
};
use crate::types::{NewPartRequest, Part, UsageRecord, UsageRequest};

/// Threshold used when `lowStockThreshold` is missing or not a positive integer.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 10;

/// Submit listeners attached by [`PageController::bootstrap`], in order.
pub const SUBMIT_LISTENERS: [(&str, FormHandler); 3] = [
    (INSERT_FORM, FormHandler::InsertPart),
    (USAGE_FORM, FormHandler::RegisterUsage),
    (BULK_INSERT_FORM, FormHandler::BulkInsertParts),
];

// =============================================================================
// SORTING
// =============================================================================

/// Sortable column of the all-parts table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartColumn {
    PartNumber,
    PartName,
    Quantity,
    Unit,
    CreatedAt,
    UpdatedAt,
}

impl PartColumn {
    /// Parse the column key carried by a table header.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "partNumber" | "part_number" => Some(Self::PartNumber),
            "partName" | "part_name" => Some(Self::PartName),
            "quantity" => Some(Self::Quantity),
            "unit" => Some(Self::Unit),
            "createdAt" | "created_at" => Some(Self::CreatedAt),
            "updatedAt" | "updated_at" => Some(Self::UpdatedAt),
            _ => None,
        }
    }

    fn compare(self, a: &Part, b: &Part) -> Ordering {
        match self {
            Self::PartNumber => a.part_number.cmp(&b.part_number),
            Self::PartName => a.part_name.cmp(&b.part_name),
            Self::Quantity => a.quantity.cmp(&b.quantity),
            Self::Unit => a.unit.cmp(&b.unit),
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Stable sort of `parts` by `column` in `order`.
pub fn sort_parts_by(parts: &mut [Part], column: PartColumn, order: SortOrder) {
    parts.sort_by(|a, b| {
        let ord = column.compare(a, b);
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}

// =============================================================================
// FORM READING
// =============================================================================

/// Calendar date as `YYYY-MM-DD`, the value format of a date input.
#[must_use]
pub fn format_date(date: Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day())
}

fn field<P: Page + ?Sized>(page: &P, id: &str) -> String {
    page.value(id).map(|v| v.trim().to_owned()).unwrap_or_default()
}

fn non_blank(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

/// Input ids of one part's fields.
struct PartFields {
    number: String,
    name: String,
    quantity: String,
    unit: String,
    description: String,
}

impl PartFields {
    fn insert_form() -> Self {
        Self {
            number: "partNumber".into(),
            name: "partName".into(),
            quantity: "quantity".into(),
            unit: "unit".into(),
            description: "description".into(),
        }
    }

    fn bulk_row(row: u32) -> Self {
        Self {
            number: format!("bulkPartNumber-{row}"),
            name: format!("bulkPartName-{row}"),
            quantity: format!("bulkQuantity-{row}"),
            unit: format!("bulkUnit-{row}"),
            description: format!("bulkDescription-{row}"),
        }
    }

    /// Read and validate the fields. `Ok(None)` means every field is blank.
    fn read<P: Page + ?Sized>(&self, page: &P) -> Result<Option<NewPartRequest>, String> {
        let number = field(page, &self.number);
        let name = field(page, &self.name);
        let quantity = field(page, &self.quantity);
        let unit = field(page, &self.unit);
        let description = field(page, &self.description);

        if [&number, &name, &quantity, &unit, &description].iter().all(|v| v.is_empty()) {
            return Ok(None);
        }
        if number.is_empty() {
            return Err("part number is required".to_owned());
        }
        if name.is_empty() {
            return Err("part name is required".to_owned());
        }
        let quantity = match quantity.parse::<i32>() {
            Ok(q) if q >= 0 => q,
            _ => return Err(format!("quantity must be a non-negative whole number (got {quantity:?})")),
        };

        Ok(Some(NewPartRequest {
            part_number: number,
            part_name: name,
            quantity,
            unit: non_blank(unit),
            description: non_blank(description),
        }))
    }
}

fn read_usage<P: Page + ?Sized>(page: &P) -> Result<UsageRequest, String> {
    let part_number = field(page, "usagePartNumber");
    if part_number.is_empty() {
        return Err("part number is required".to_owned());
    }
    let raw_quantity = field(page, "quantityUsed");
    let quantity_used = match raw_quantity.parse::<i32>() {
        Ok(q) if q > 0 => q,
        _ => return Err(format!("quantity used must be a positive whole number (got {raw_quantity:?})")),
    };
    let usage_location = field(page, "usageLocation");
    if usage_location.is_empty() {
        return Err("usage location is required".to_owned());
    }

    Ok(UsageRequest {
        part_number,
        quantity_used,
        usage_location,
        used_date: non_blank(field(page, USED_DATE_INPUT)),
        note: non_blank(field(page, "usageNote")),
    })
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// Lists refreshed by one `reload` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Lists {
    parts: bool,
    low_stock: bool,
    usage: bool,
}

impl Lists {
    const ALL: Self = Self { parts: true, low_stock: true, usage: true };
    const PARTS: Self = Self { parts: true, low_stock: true, usage: false };
}

/// Page-level state and the operations that act on it.
///
/// The calendar date is never stored: operations that write `usedDate`
/// take the caller's current date, so a page left open past midnight picks
/// up the new day.
#[derive(Debug, Clone)]
pub struct PageController {
    all_parts_data: Vec<Part>,
    current_sort_column: Option<PartColumn>,
    current_sort_order: SortOrder,
    bulk_row_counter: u32,
    bootstrapped: bool,
}

impl Default for PageController {
    fn default() -> Self {
        Self {
            all_parts_data: Vec::new(),
            current_sort_column: None,
            current_sort_order: SortOrder::Asc,
            bulk_row_counter: 1,
            bootstrapped: false,
        }
    }
}

impl PageController {
    /// Controller for a freshly loaded page. The bulk form starts with one
    /// row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn all_parts_data(&self) -> &[Part] {
        &self.all_parts_data
    }

    #[must_use]
    pub fn current_sort_column(&self) -> Option<PartColumn> {
        self.current_sort_column
    }

    #[must_use]
    pub fn current_sort_order(&self) -> SortOrder {
        self.current_sort_order
    }

    #[must_use]
    pub fn bulk_row_counter(&self) -> u32 {
        self.bulk_row_counter
    }

    #[must_use]
    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped
    }

    /// Document-ready wiring: attach the three submit listeners, pre-fill
    /// `usedDate` with `today`, then load all parts, low-stock parts and
    /// usage concurrently. Runs once; later calls do nothing.
    pub async fn bootstrap<P, A>(&mut self, page: &mut P, api: &A, today: Date)
    where
        P: Page + ?Sized,
        A: InventoryApi + ?Sized,
    {
        if self.bootstrapped {
            return;
        }
        self.bootstrapped = true;

        for (form_id, handler) in SUBMIT_LISTENERS {
            if !page.add_submit_listener(form_id, handler) {
                warn!(form_id, "form not found; submit listener not attached");
            }
        }

        if !page.set_value(USED_DATE_INPUT, &format_date(today)) {
            warn!(input = USED_DATE_INPUT, "date input not found");
        }

        self.reload(page, api, Lists::ALL).await;
        info!("inventory page ready");
    }

    /// Route a submit captured by a listener to its handler. `today` is the
    /// date at submit time.
    pub async fn handle_submit<P, A>(
        &mut self,
        page: &mut P,
        api: &A,
        handler: FormHandler,
        event: &mut SubmitEvent,
        today: Date,
    ) where
        P: Page + ?Sized,
        A: InventoryApi + ?Sized,
    {
        match handler {
            FormHandler::InsertPart => self.insert_part(page, api, event).await,
            FormHandler::RegisterUsage => self.register_usage(page, api, event, today).await,
            FormHandler::BulkInsertParts => self.bulk_insert_parts(page, api, event).await,
        }
    }

    /// Submit handler of `insertForm`.
    pub async fn insert_part<P, A>(&mut self, page: &mut P, api: &A, event: &mut SubmitEvent)
    where
        P: Page + ?Sized,
        A: InventoryApi + ?Sized,
    {
        event.prevent_default();

        let part = match PartFields::insert_form().read(page) {
            Ok(Some(part)) => part,
            Ok(None) => {
                page.show_message("part number is required", MessageKind::Error);
                return;
            }
            Err(message) => {
                page.show_message(&message, MessageKind::Error);
                return;
            }
        };

        match api.insert_part(&part).await {
            Ok(message) => {
                info!(part_number = %part.part_number, "part submitted");
                page.show_message(&message, MessageKind::Success);
                page.reset_form(INSERT_FORM);
                self.reload(page, api, Lists::PARTS).await;
            }
            Err(e) => show_api_error(page, "failed to register part", &e),
        }
    }

    /// Submit handler of `usageForm`. On success the form is reset and
    /// `usedDate` is set back to `today`.
    pub async fn register_usage<P, A>(&mut self, page: &mut P, api: &A, event: &mut SubmitEvent, today: Date)
    where
        P: Page + ?Sized,
        A: InventoryApi + ?Sized,
    {
        event.prevent_default();

        let usage = match read_usage(page) {
            Ok(usage) => usage,
            Err(message) => {
                page.show_message(&message, MessageKind::Error);
                return;
            }
        };

        match api.register_usage(&usage).await {
            Ok(record) => {
                info!(usage_id = record.usage_id, "usage submitted");
                page.show_message(
                    &format!("usage registered: {} x {}", record.part_number, record.quantity_used),
                    MessageKind::Success,
                );
                page.reset_form(USAGE_FORM);
                page.set_value(USED_DATE_INPUT, &format_date(today));
                self.reload(page, api, Lists::ALL).await;
            }
            Err(e) => show_api_error(page, "failed to register usage", &e),
        }
    }

    /// Submit handler of `bulkInsertForm`. Rows whose fields are all blank
    /// are skipped.
    pub async fn bulk_insert_parts<P, A>(&mut self, page: &mut P, api: &A, event: &mut SubmitEvent)
    where
        P: Page + ?Sized,
        A: InventoryApi + ?Sized,
    {
        event.prevent_default();

        let mut parts = Vec::new();
        for row in 1..=self.bulk_row_counter {
            match PartFields::bulk_row(row).read(page) {
                Ok(Some(part)) => parts.push(part),
                Ok(None) => {}
                Err(message) => {
                    page.show_message(&format!("row {row}: {message}"), MessageKind::Error);
                    return;
                }
            }
        }
        if parts.is_empty() {
            page.show_message("enter at least one part", MessageKind::Error);
            return;
        }

        match api.bulk_insert_parts(&parts).await {
            Ok(outcome) => {
                info!(inserted = outcome.inserted, merged = outcome.merged, "bulk insert submitted");
                page.show_message(
                    &format!(
                        "bulk insert complete: {} new, {} merged",
                        outcome.inserted, outcome.merged
                    ),
                    MessageKind::Success,
                );
                page.reset_form(BULK_INSERT_FORM);
                self.reload(page, api, Lists::PARTS).await;
            }
            Err(e) => show_api_error(page, "bulk insert failed", &e),
        }
    }

    /// Add a row to the bulk-insert form and return its index.
    pub fn add_bulk_row(&mut self) -> u32 {
        self.bulk_row_counter += 1;
        self.bulk_row_counter
    }

    /// Fetch all parts, remember them, and render them in the current sort.
    pub async fn load_all_parts<P, A>(&mut self, page: &mut P, api: &A)
    where
        P: Page + ?Sized,
        A: InventoryApi + ?Sized,
    {
        self.reload(page, api, Lists { parts: true, low_stock: false, usage: false })
            .await;
    }

    /// Fetch and render parts at or below the page's threshold.
    pub async fn load_low_stock_parts<P, A>(&mut self, page: &mut P, api: &A)
    where
        P: Page + ?Sized,
        A: InventoryApi + ?Sized,
    {
        self.reload(page, api, Lists { parts: false, low_stock: true, usage: false })
            .await;
    }

    /// Fetch and render every usage record.
    pub async fn load_all_usage<P, A>(&mut self, page: &mut P, api: &A)
    where
        P: Page + ?Sized,
        A: InventoryApi + ?Sized,
    {
        self.reload(page, api, Lists { parts: false, low_stock: false, usage: true })
            .await;
    }

    /// Sort the parts table by `column`: a repeated column flips the order,
    /// a new column starts ascending. Sorting is local to `allPartsData`.
    pub fn sort_parts<P: Page + ?Sized>(&mut self, page: &mut P, column: PartColumn) {
        if self.current_sort_column == Some(column) {
            self.current_sort_order = self.current_sort_order.toggled();
        } else {
            self.current_sort_column = Some(column);
            self.current_sort_order = SortOrder::Asc;
        }
        self.render_all_parts(page);
    }

    /// The one load path behind every loader: the selected requests are
    /// issued together and each result is rendered once all have settled.
    async fn reload<P, A>(&mut self, page: &mut P, api: &A, lists: Lists)
    where
        P: Page + ?Sized,
        A: InventoryApi + ?Sized,
    {
        let threshold = low_stock_threshold(page);
        let (parts, low_stock, usage) = futures::join!(
            OptionFuture::from(lists.parts.then(|| api.list_parts())),
            OptionFuture::from(lists.low_stock.then(|| api.list_low_stock_parts(threshold))),
            OptionFuture::from(lists.usage.then(|| api.list_usage()))
        );
        if let Some(result) = parts {
            self.show_all_parts(page, result);
        }
        if let Some(result) = low_stock {
            show_low_stock(page, result);
        }
        if let Some(result) = usage {
            show_usage(page, result);
        }
    }

    fn show_all_parts<P: Page + ?Sized>(&mut self, page: &mut P, result: Result<Vec<Part>, ApiError>) {
        match result {
            Ok(parts) => {
                self.all_parts_data = parts;
                self.render_all_parts(page);
            }
            Err(e) => show_api_error(page, "failed to load parts", &e),
        }
    }

    fn render_all_parts<P: Page + ?Sized>(&self, page: &mut P) {
        let mut rows = self.all_parts_data.clone();
        if let Some(column) = self.current_sort_column {
            sort_parts_by(&mut rows, column, self.current_sort_order);
        }
        page.render_parts(PartsTable::All, &rows);
    }
}

/// Threshold from the `lowStockThreshold` input, or the default.
fn low_stock_threshold<P: Page + ?Sized>(page: &P) -> i32 {
    page.value(LOW_STOCK_THRESHOLD_INPUT)
        .and_then(|raw| raw.trim().parse::<i32>().ok())
        .filter(|threshold| *threshold > 0)
        .unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD)
}

fn show_low_stock<P: Page + ?Sized>(page: &mut P, result: Result<Vec<Part>, ApiError>) {
    match result {
        Ok(parts) => page.render_parts(PartsTable::LowStock, &parts),
        Err(e) => show_api_error(page, "failed to load low-stock parts", &e),
    }
}

fn show_usage<P: Page + ?Sized>(page: &mut P, result: Result<Vec<UsageRecord>, ApiError>) {
    match result {
        Ok(records) => page.render_usage(&records),
        Err(e) => show_api_error(page, "failed to load usage", &e),
    }
}

fn show_api_error<P: Page + ?Sized>(page: &mut P, context: &str, err: &ApiError) {
    warn!(error = %err, "{context}");
    page.show_message(&format!("{context}: {err}"), MessageKind::Error);
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;
