// 📈 Report Document - multi-page SVG with cover, charts, and data tables
// One page-sized band per section, stacked vertically in a single file

use std::path::Path;

use anyhow::Result;
use chrono::Local;
use log::info;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{FontDesc, FontFamily, FontStyle};

use crate::db::{AggregateRow, SalesSummary};

pub const PAGE_WIDTH: u32 = 850;
pub const PAGE_HEIGHT: u32 = 1100;

/// Rows shown on a detail page before truncation
const TABLE_ROW_LIMIT: usize = 28;

const NAVY: RGBColor = RGBColor(0, 51, 102);
const GREY_TEXT: RGBColor = RGBColor(102, 102, 102);
const GREY_FOOTER: RGBColor = RGBColor(153, 153, 153);
const ROW_SHADE: RGBColor = RGBColor(242, 242, 242);
const CELL_BORDER: RGBColor = RGBColor(51, 51, 51);
const BAR_BLUE: RGBColor = RGBColor(70, 114, 178);
const BAR_GREEN: RGBColor = RGBColor(85, 150, 95);
const LINE_RED: RGBColor = RGBColor(139, 0, 0);

type Page<'a> = DrawingArea<SVGBackend<'a>, plotters::coord::Shift>;

/// Render the full report document: cover page, charts page, and one detail
/// page per aggregate table. Empty aggregate sets render as an empty state
/// instead of failing.
pub fn render_report_document(
    path: &Path,
    affiliate: &[AggregateRow],
    category: &[AggregateRow],
    monthly: &[AggregateRow],
    summary: &SalesSummary,
) -> Result<()> {
    let pages = 5u32;
    let root = SVGBackend::new(path, (PAGE_WIDTH, PAGE_HEIGHT * pages)).into_drawing_area();
    root.fill(&WHITE)?;

    let areas = root.split_evenly((pages as usize, 1));
    draw_cover_page(&areas[0], summary)?;
    draw_charts_page(&areas[1], affiliate, category, monthly)?;
    draw_table_page(
        &areas[2],
        "Sales by Affiliate",
        "Total sales in USD for each affiliate, sorted by highest sales.",
        "Affiliate",
        affiliate,
    )?;
    draw_table_page(
        &areas[3],
        "Sales by Category",
        "Total sales in USD for each product category, sorted by highest sales.",
        "Category",
        category,
    )?;
    draw_table_page(
        &areas[4],
        "Monthly Sales Trend",
        "Total sales in USD for each month, including unknown dates.",
        "Month",
        monthly,
    )?;

    root.present()?;
    info!("Rendered report document ({} pages)", pages);
    Ok(())
}

// ============================================================================
// COVER PAGE
// ============================================================================

fn draw_cover_page(area: &Page, summary: &SalesSummary) -> Result<()> {
    let center_x = (PAGE_WIDTH / 2) as i32;

    area.draw(&Text::new(
        "SALES REPORT",
        (center_x, 170),
        style(42.0, FontStyle::Bold, &NAVY, HPos::Center),
    ))?;
    area.draw(&Text::new(
        "Executive Summary",
        (center_x, 245),
        style(24.0, FontStyle::Italic, &GREY_TEXT, HPos::Center),
    ))?;
    area.draw(&Text::new(
        format!("Generated on {}", Local::now().format("%B %d, %Y at %I:%M %p")),
        (center_x, 290),
        style(15.0, FontStyle::Normal, &GREY_TEXT, HPos::Center),
    ))?;

    // Separator under the title block
    area.draw(&PathElement::new(
        vec![(85, 340), (765, 340)],
        NAVY.stroke_width(2),
    ))?;

    area.draw(&Text::new(
        "SUMMARY STATISTICS",
        (center_x, 400),
        style(18.0, FontStyle::Bold, &NAVY, HPos::Center),
    ))?;

    let rows = [
        ("Total Orders:", format_count(summary.total_orders)),
        ("Total Sales (USD):", format_currency(summary.total_sales_usd)),
        ("Average Order Value:", format_currency(summary.avg_order_value_usd)),
        ("Minimum Order Value:", format_currency(summary.min_order_value_usd)),
        ("Maximum Order Value:", format_currency(summary.max_order_value_usd)),
    ];

    for (i, (label, value)) in rows.iter().enumerate() {
        let y = 455 + (i as i32) * 40;
        area.draw(&Text::new(
            *label,
            (center_x - 25, y),
            style(15.0, FontStyle::Bold, &BLACK, HPos::Right),
        ))?;
        area.draw(&Text::new(
            value.clone(),
            (center_x + 25, y),
            style(15.0, FontStyle::Normal, &BLACK, HPos::Left),
        ))?;
    }

    draw_footer(area)?;
    Ok(())
}

// ============================================================================
// CHARTS PAGE
// ============================================================================

fn draw_charts_page(
    area: &Page,
    affiliate: &[AggregateRow],
    category: &[AggregateRow],
    monthly: &[AggregateRow],
) -> Result<()> {
    let (title_band, body) = area.split_vertically(60);
    title_band.draw(&Text::new(
        "Sales Performance Analysis",
        ((PAGE_WIDTH / 2) as i32, 35),
        style(20.0, FontStyle::Bold, &NAVY, HPos::Center),
    ))?;

    let panels = body.split_evenly((3, 1));
    draw_bar_panel(&panels[0], "Sales by Affiliate (USD)", "Affiliate", affiliate, BAR_BLUE)?;
    draw_bar_panel(&panels[1], "Sales by Category (USD)", "Category", category, BAR_GREEN)?;
    draw_line_panel(&panels[2], monthly)?;

    Ok(())
}

/// Horizontal bar chart with a value label at the end of each bar
fn draw_bar_panel(
    area: &Page,
    title: &str,
    y_desc: &str,
    rows: &[AggregateRow],
    color: RGBColor,
) -> Result<()> {
    if rows.is_empty() {
        return draw_empty_panel(area, title);
    }

    // Extra x headroom keeps the value labels inside the plot area
    let x_max = max_total(rows) * 1.3;

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 16))
        .margin(20)
        .x_label_area_size(35)
        .y_label_area_size(130)
        .build_cartesian_2d(0.0..x_max, (0..rows.len()).into_segmented())?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .x_desc("Total Sales (USD)")
        .y_desc(y_desc)
        .label_style(("sans-serif", 11))
        .x_label_formatter(&|v| format!("${:.0}", v))
        .y_label_formatter(&|seg| match seg {
            SegmentValue::CenterOf(i) => rows
                .get(*i)
                .map(|row| row.key.clone())
                .unwrap_or_default(),
            _ => String::new(),
        })
        .draw()?;

    chart.draw_series(rows.iter().enumerate().map(|(i, row)| {
        Rectangle::new(
            [
                (0.0, SegmentValue::Exact(i)),
                (row.total_sales_usd, SegmentValue::Exact(i + 1)),
            ],
            color.filled(),
        )
    }))?;

    chart.draw_series(rows.iter().enumerate().map(|(i, row)| {
        Text::new(
            format_currency(row.total_sales_usd),
            (row.total_sales_usd + x_max * 0.01, SegmentValue::CenterOf(i)),
            style(11.0, FontStyle::Normal, &BLACK, HPos::Left),
        )
    }))?;

    Ok(())
}

/// Line chart of monthly totals with markers and value labels
fn draw_line_panel(area: &Page, monthly: &[AggregateRow]) -> Result<()> {
    let title = "Monthly Sales Trend (USD)";
    if monthly.is_empty() {
        return draw_empty_panel(area, title);
    }

    let n = monthly.len();
    let y_max = max_total(monthly) * 1.2;

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 16))
        .margin(20)
        .x_label_area_size(35)
        .y_label_area_size(70)
        .build_cartesian_2d(-0.5..(n as f64 - 0.5), 0.0..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Month")
        .y_desc("Total Sales (USD)")
        .label_style(("sans-serif", 11))
        .x_labels(n)
        .x_label_formatter(&|v| {
            let i = v.round();
            if (v - i).abs() < 0.25 && i >= 0.0 {
                monthly
                    .get(i as usize)
                    .map(|row| row.key.clone())
                    .unwrap_or_default()
            } else {
                String::new()
            }
        })
        .y_label_formatter(&|v| format!("${:.0}", v))
        .draw()?;

    chart.draw_series(LineSeries::new(
        monthly
            .iter()
            .enumerate()
            .map(|(i, row)| (i as f64, row.total_sales_usd)),
        LINE_RED.stroke_width(2),
    ))?;

    chart.draw_series(monthly.iter().enumerate().map(|(i, row)| {
        Circle::new((i as f64, row.total_sales_usd), 4, LINE_RED.filled())
    }))?;

    chart.draw_series(monthly.iter().enumerate().map(|(i, row)| {
        Text::new(
            format_currency(row.total_sales_usd),
            (i as f64, row.total_sales_usd + y_max * 0.04),
            style(11.0, FontStyle::Normal, &BLACK, HPos::Center),
        )
    }))?;

    Ok(())
}

fn draw_empty_panel(area: &Page, title: &str) -> Result<()> {
    let (width, height) = area.dim_in_pixel();
    area.draw(&Text::new(
        title,
        ((width / 2) as i32, 30),
        style(16.0, FontStyle::Bold, &BLACK, HPos::Center),
    ))?;
    area.draw(&Text::new(
        "No data for this period",
        ((width / 2) as i32, (height / 2) as i32),
        style(14.0, FontStyle::Italic, &GREY_TEXT, HPos::Center),
    ))?;
    Ok(())
}

// ============================================================================
// TABLE PAGES
// ============================================================================

/// Styled grid: distinct header row, alternating row shading, and a
/// currency-formatted totals column
fn draw_table_page(
    area: &Page,
    title: &str,
    description: &str,
    key_header: &str,
    rows: &[AggregateRow],
) -> Result<()> {
    let center_x = (PAGE_WIDTH / 2) as i32;

    area.draw(&Text::new(
        title,
        (center_x, 70),
        style(22.0, FontStyle::Bold, &NAVY, HPos::Center),
    ))?;
    area.draw(&Text::new(
        description,
        (center_x, 105),
        style(13.0, FontStyle::Italic, &GREY_TEXT, HPos::Center),
    ))?;

    if rows.is_empty() {
        area.draw(&Text::new(
            "No rows to display",
            (center_x, 200),
            style(14.0, FontStyle::Italic, &GREY_TEXT, HPos::Center),
        ))?;
        draw_footer(area)?;
        return Ok(());
    }

    // Two columns centered on the page
    let key_x0 = 105;
    let split_x = 505;
    let total_x1 = 745;
    let top = 150;
    let row_h = 30;

    let visible = rows.len().min(TABLE_ROW_LIMIT);

    for i in 0..=visible {
        let y0 = top + (i as i32) * row_h;
        let y1 = y0 + row_h;

        // Header fill, then alternating shading on data rows
        if i == 0 {
            area.draw(&Rectangle::new(
                [(key_x0, y0), (total_x1, y1)],
                NAVY.filled(),
            ))?;
        } else if i % 2 == 0 {
            area.draw(&Rectangle::new(
                [(key_x0, y0), (total_x1, y1)],
                ROW_SHADE.filled(),
            ))?;
        }

        for (x0, x1) in [(key_x0, split_x), (split_x, total_x1)] {
            area.draw(&Rectangle::new(
                [(x0, y0), (x1, y1)],
                CELL_BORDER.stroke_width(1),
            ))?;
        }

        let (key_text, total_text, text_style, value_style) = if i == 0 {
            (
                key_header.to_string(),
                "Total Sales (USD)".to_string(),
                style(13.0, FontStyle::Bold, &WHITE, HPos::Left),
                style(13.0, FontStyle::Bold, &WHITE, HPos::Right),
            )
        } else {
            let row = &rows[i - 1];
            (
                row.key.clone(),
                format_currency(row.total_sales_usd),
                style(13.0, FontStyle::Normal, &BLACK, HPos::Left),
                style(13.0, FontStyle::Normal, &BLACK, HPos::Right),
            )
        };

        let text_y = y0 + row_h / 2;
        area.draw(&Text::new(key_text, (key_x0 + 12, text_y), text_style))?;
        area.draw(&Text::new(total_text, (total_x1 - 12, text_y), value_style))?;
    }

    if rows.len() > visible {
        area.draw(&Text::new(
            format!("... and {} more rows", rows.len() - visible),
            (center_x, top + ((visible + 1) as i32) * row_h + 20),
            style(12.0, FontStyle::Italic, &GREY_TEXT, HPos::Center),
        ))?;
    }

    draw_footer(area)?;
    Ok(())
}

fn draw_footer(area: &Page) -> Result<()> {
    let center_x = (PAGE_WIDTH / 2) as i32;
    let bottom = PAGE_HEIGHT as i32;

    area.draw(&Text::new(
        "CONFIDENTIAL - FOR INTERNAL USE ONLY",
        (center_x, bottom - 50),
        style(10.0, FontStyle::Normal, &GREY_FOOTER, HPos::Center),
    ))?;
    area.draw(&Text::new(
        format!("Generated on {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
        (center_x, bottom - 32),
        style(10.0, FontStyle::Normal, &GREY_FOOTER, HPos::Center),
    ))?;
    Ok(())
}

// ============================================================================
// FORMATTING HELPERS
// ============================================================================

fn style(size: f64, font_style: FontStyle, color: &RGBColor, h: HPos) -> TextStyle<'static> {
    FontDesc::new(FontFamily::SansSerif, size, font_style)
        .color(color)
        .pos(Pos::new(h, VPos::Center))
}

fn max_total(rows: &[AggregateRow]) -> f64 {
    rows.iter()
        .map(|row| row.total_sales_usd)
        .fold(0.0, f64::max)
        .max(1.0)
}

/// "$1,234.56" (negatives as "-$1,234.56")
pub fn format_currency(value: f64) -> String {
    let cents = format!("{:.2}", value.abs());
    let (int_part, frac) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));
    let grouped = group_thousands(int_part);

    if value < 0.0 {
        format!("-${}.{}", grouped, frac)
    } else {
        format!("${}.{}", grouped, frac)
    }
}

/// "1,234"
pub fn format_count(value: i64) -> String {
    let digits = value.abs().to_string();
    let grouped = group_thousands(&digits);

    if value < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================
