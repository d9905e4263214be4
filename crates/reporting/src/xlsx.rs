//! Spreadsheet export of the profitability report.

use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, XlsxError};

use crate::profitability::ProfitabilityReport;

/// Download name for the exported workbook.
pub const REPORT_FILE_NAME: &str = "Sales_Profitability.xlsx";

const HEADER_BG: Color = Color::RGB(0xD9E1F2);
const COLUMN_WIDTHS: [f64; 8] = [10.0, 15.0, 25.0, 15.0, 20.0, 15.0, 15.0, 15.0];
const HEADERS: [&str; 8] = [
    "Sno", "Order", "Customer", "Date", "Category", "Revenue", "Cost", "Margin",
];

fn cents(amount: i64) -> f64 {
    amount as f64 / 100.0
}

/// Render the report to an in-memory xlsx workbook.
///
/// Layout: merged title banner, filter summary block, header row, one money
/// row per order, highlighted TOTAL row.
pub fn render_xlsx(report: &ProfitabilityReport) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Sales Profitability")?;

    for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
        worksheet.set_column_width(col as u16, *width)?;
    }

    let title = Format::new()
        .set_bold()
        .set_font_size(16)
        .set_align(FormatAlign::Center);
    let header = Format::new()
        .set_bold()
        .set_background_color(HEADER_BG)
        .set_font_size(12)
        .set_align(FormatAlign::Center);
    let money = Format::new().set_num_format("#,##0.00");
    let total = Format::new().set_bold().set_background_color(HEADER_BG);
    let total_money = Format::new()
        .set_bold()
        .set_background_color(HEADER_BG)
        .set_num_format("#,##0.00");
    let bold = Format::new().set_bold();
    let centered = Format::new().set_align(FormatAlign::Center);

    let mut row = 0;
    worksheet.merge_range(row, 0, row, 7, "Sales Profitability Report", &title)?;
    row += 2;

    worksheet.write_string_with_format(row, 0, "From Date", &bold)?;
    worksheet.write_string_with_format(
        row,
        1,
        report.start_date.format("%m/%d/%Y").to_string(),
        &bold,
    )?;
    worksheet.write_string_with_format(row, 2, "To Date", &bold)?;
    worksheet.write_string_with_format(
        row,
        3,
        report.end_date.format("%m/%d/%Y").to_string(),
        &bold,
    )?;
    row += 1;

    worksheet.write_string_with_format(row, 0, "Customers", &bold)?;
    worksheet.write_string_with_format(row, 1, &report.customer_filter, &bold)?;
    row += 1;

    worksheet.write_string_with_format(row, 0, "Categories", &bold)?;
    worksheet.write_string_with_format(row, 1, &report.category_filter, &bold)?;
    row += 2;

    for (col, name) in HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(row, col as u16, *name, &header)?;
    }
    row += 1;

    for record in &report.rows {
        worksheet.write_number_with_format(row, 0, record.sno as f64, &centered)?;
        worksheet.write_string(row, 1, &record.order)?;
        worksheet.write_string(row, 2, &record.customer)?;
        worksheet.write_string(row, 3, record.date.format("%m-%d-%Y").to_string())?;
        worksheet.write_string(row, 4, &record.category)?;
        worksheet.write_number_with_format(row, 5, cents(record.revenue), &money)?;
        worksheet.write_number_with_format(row, 6, cents(record.cost), &money)?;
        worksheet.write_number_with_format(row, 7, cents(record.margin), &money)?;
        row += 1;
    }

    worksheet.write_string_with_format(row, 4, "TOTAL", &total)?;
    worksheet.write_number_with_format(row, 5, cents(report.totals.revenue), &total_money)?;
    worksheet.write_number_with_format(row, 6, cents(report.totals.cost), &total_money)?;
    worksheet.write_number_with_format(row, 7, cents(report.totals.margin), &total_money)?;

    workbook.save_to_buffer()
}
