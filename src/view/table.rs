use terminal_size::{terminal_size, Width};

const MIN_COL_WIDTH: usize = 24;

// Render rows as an ASCII table.
// Column widths are capped so a row fits the terminal (80 columns when
// there is no terminal).
pub fn render(headers: &[&str], rows: &[Vec<String>]) -> String {
    render_with_width(headers, rows, terminal_width())
}

pub fn render_with_width(headers: &[&str], rows: &[Vec<String>], total: usize) -> String {
    let ncols = headers.len().max(1);
    // borders and padding take 3 chars per column plus one; narrow
    // terminals wrap rather than shrink columns below MIN_COL_WIDTH
    let max_col_width = (total.saturating_sub(1) / ncols).saturating_sub(3).max(MIN_COL_WIDTH);
    let mut widths: Vec<usize> = headers.iter().map(|h| display_len(h).min(max_col_width)).collect();
    for r in rows {
        for (i, cell) in r.iter().enumerate().take(headers.len()) {
            let w = display_len(cell);
            if w > widths[i] { widths[i] = w.min(max_col_width); }
        }
    }

    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let sep = build_separator(&widths);
    let mut out = Vec::with_capacity(rows.len() + 4);
    out.push(sep.clone());
    out.push(build_row(&header_cells, &widths));
    out.push(sep.clone());
    for r in rows {
        out.push(build_row(r, &widths));
    }
    out.push(sep);
    out.join("\n")
}

fn terminal_width() -> usize {
    match terminal_size() {
        Some((Width(w), _)) if w > 20 => (w - 4) as usize,
        _ => 80,
    }
}

fn display_len(s: &str) -> usize { s.chars().count() }

fn build_separator(widths: &[usize]) -> String {
    let mut s = String::from("+");
    for w in widths {
        s.push_str(&"-".repeat(*w + 2));
        s.push('+');
    }
    s
}

fn build_row(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::from("|");
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).map(String::as_str).unwrap_or("");
        let text = truncate(cell, *w);
        let pad = " ".repeat(w.saturating_sub(display_len(&text)));
        s.push(' ');
        if is_numeric_like(cell) {
            s.push_str(&pad);
            s.push_str(&text);
        } else {
            s.push_str(&text);
            s.push_str(&pad);
        }
        s.push_str(" |");
    }
    s
}

fn truncate(s: &str, max: usize) -> String {
    if display_len(s) <= max { return s.to_string(); }
    if max <= 1 { return "…".to_string(); }
    s.chars().take(max - 1).collect::<String>() + "…"
}

fn is_numeric_like(s: &str) -> bool {
    // crude detection for aligning numbers to right
    let st = s.trim();
    let mut has_digit = false;
    for ch in st.chars() {
        if ch.is_ascii_digit() { has_digit = true; continue; }
        if ".-+,%".contains(ch) { continue; }
        return false;
    }
    has_digit
}
