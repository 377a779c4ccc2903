pub fn format_currency(amount: f64) -> String {
    format!("${:.2}", amount)
}
