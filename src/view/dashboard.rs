//! Metrics overview. Everything except the user count is demo data.

use super::table;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stat {
    pub title: &'static str,
    pub value: f64,
    pub precision: usize,
    pub suffix: &'static str,
}

impl Stat {
    pub fn formatted(&self) -> String { format!("{:.*}{}", self.precision, self.value, self.suffix) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Completed,
    Processing,
    Cancelled,
}

impl OrderStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Completed => "completed",
            OrderStatus::Processing => "processing",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub number: &'static str,
    pub customer: &'static str,
    pub date: &'static str,
    pub amount: f64,
    pub status: OrderStatus,
}

pub const SALES_TREND: [(&str, u32); 6] =
    [("Jan", 1200), ("Feb", 1900), ("Mar", 1500), ("Apr", 2400), ("May", 2100), ("Jun", 3200)];

pub const QUARTER_PROGRESS: u8 = 66;

pub fn recent_orders() -> Vec<Order> {
    vec![
        Order { number: "ORD-2023-001", customer: "Zhang San", date: "2023-11-01", amount: 1250.0, status: OrderStatus::Completed },
        Order { number: "ORD-2023-002", customer: "Li Si", date: "2023-11-02", amount: 890.0, status: OrderStatus::Processing },
        Order { number: "ORD-2023-003", customer: "Wang Wu", date: "2023-11-03", amount: 2100.0, status: OrderStatus::Completed },
        Order { number: "ORD-2023-004", customer: "Zhao Liu", date: "2023-11-04", amount: 1560.0, status: OrderStatus::Cancelled },
    ]
}

pub fn stats(total_users: usize) -> [Stat; 4] {
    [
        Stat { title: "Total users", value: total_users as f64, precision: 0, suffix: "" },
        Stat { title: "Orders today", value: 28.0, precision: 0, suffix: "" },
        Stat { title: "Sales today", value: 12500.0, precision: 2, suffix: "" },
        Stat { title: "Conversion", value: 38.5, precision: 2, suffix: "%" },
    ]
}

fn bar(value: u32, max: u32, width: usize) -> String {
    let filled = if max == 0 { 0 } else { (value as usize * width) / max as usize };
    "#".repeat(filled)
}

pub fn progress_bar(percent: u8, width: usize) -> String {
    let p = percent.min(100) as usize;
    let filled = p * width / 100;
    format!("[{}{}] {}%", "=".repeat(filled), " ".repeat(width - filled), p)
}

pub fn render(total_users: usize) -> String {
    let mut out = Vec::new();
    let cards: Vec<String> = stats(total_users).iter().map(|s| format!("{}: {}", s.title, s.formatted())).collect();
    out.push(cards.join(" | "));
    out.push(String::new());

    out.push("Sales trend".to_string());
    let max = SALES_TREND.iter().map(|(_, v)| *v).max().unwrap_or(0);
    for (month, v) in SALES_TREND {
        out.push(format!("  {:<3} {:>5} {}", month, v, bar(v, max, 32)));
    }
    out.push(String::new());

    out.push("Recent orders".to_string());
    let rows: Vec<Vec<String>> = recent_orders()
        .into_iter()
        .map(|o| {
            vec![
                o.number.to_string(),
                o.customer.to_string(),
                o.date.to_string(),
                format!("{:.2}", o.amount),
                o.status.label().to_string(),
            ]
        })
        .collect();
    out.push(table::render(&["Order", "Customer", "Date", "Amount", "Status"], &rows));
    out.push(String::new());

    out.push(format!("Quarterly target {}", progress_bar(QUARTER_PROGRESS, 30)));
    out.join("\n")
}
