/// Currency text formatting. Defaults to Swedish kronor (`1 234,50 kr`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Money {
    pub decimals: usize,
    pub decimal_separator: char,
    pub group_separator: char,
    pub suffix: String,
}

impl Default for Money {
    fn default() -> Self {
        Self::swedish()
    }
}

impl Money {
    pub fn swedish() -> Self {
        Self {
            decimals: 2,
            decimal_separator: ',',
            group_separator: ' ',
            suffix: " kr".to_string(),
        }
    }

    pub fn format(&self, amount: f64) -> String {
        let amount = if amount.is_finite() { amount } else { 0.0 };
        let fixed = format!("{:.*}", self.decimals, amount.abs());
        let (whole, fraction) = match fixed.split_once('.') {
            Some((whole, fraction)) => (whole, Some(fraction)),
            None => (fixed.as_str(), None),
        };

        let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
        for (index, digit) in whole.chars().enumerate() {
            if index > 0 && (whole.len() - index) % 3 == 0 {
                grouped.push(self.group_separator);
            }
            grouped.push(digit);
        }

        // "-0,00" is noise; only show the sign when something survives rounding.
        let negative = amount < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0');
        let mut out = String::new();
        if negative {
            out.push('-');
        }
        out.push_str(&grouped);
        if let Some(fraction) = fraction {
            out.push(self.decimal_separator);
            out.push_str(fraction);
        }
        out.push_str(&self.suffix);
        out
    }
}

/// Shortest display of a quantity: `2`, `1,5`, `0,25`.
pub fn format_quantity(value: f64, decimal_separator: char) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    if value.fract() == 0.0 {
        // Beyond i64 range a cast would saturate.
        if value.abs() < 1e15 {
            return format!("{}", value as i64);
        }
        return format!("{value}");
    }
    let fixed = format!("{value:.2}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    trimmed.replace('.', &decimal_separator.to_string())
}
