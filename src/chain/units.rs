use alloy::primitives::utils::{format_units, parse_units};
use alloy::primitives::{Address, U256};
use anyhow::{Result, anyhow, bail};

pub const TOKEN_DECIMALS: u8 = 18;

/// Parses an address the way web3's `isAddress` does: optional `0x`, 40 hex digits,
/// and a valid EIP-55 checksum whenever the input mixes cases.
pub fn parse_address(value: &str) -> Result<Address> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(anyhow!("{value} is not a 20 byte hex address"));
    }

    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    let prefixed = format!("0x{digits}");
    if has_lower && has_upper {
        return Address::parse_checksummed(&prefixed, None)
            .map_err(|_| anyhow!("{value} has an invalid checksum"));
    }
    prefixed
        .parse::<Address>()
        .map_err(|err| anyhow!("{value} is not a valid address: {err}"))
}

/// Converts a decimal amount of whole tokens to base units (`toWei(…, 'ether')`).
/// Amounts finer than one base unit are rejected rather than rounded away.
pub fn parse_token_amount(value: &str) -> Result<U256> {
    let trimmed = value.trim();
    let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    if whole.is_empty() && fraction.is_empty() {
        bail!("Token amount {value:?} has no digits");
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        bail!("Token amount {value} must be a non-negative decimal");
    }
    if fraction.len() > TOKEN_DECIMALS as usize {
        bail!("Token amount {value} has more than {TOKEN_DECIMALS} decimal places");
    }
    let whole = if whole.is_empty() { "0" } else { whole };
    let normalized = if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    };
    let units = parse_units(&normalized, TOKEN_DECIMALS)
        .map_err(|err| anyhow!("Token amount {value}: {err}"))?;
    Ok(units.get_absolute())
}

/// Renders base units as whole tokens, trimming trailing zeros (`fromWei`).
pub fn format_token_amount(amount: U256) -> Result<String> {
    let rendered = format_units(amount, TOKEN_DECIMALS)
        .map_err(|err| anyhow!("Cannot format token amount {amount}: {err}"))?;
    Ok(match rendered.split_once('.') {
        Some((whole, fraction)) => match fraction.trim_end_matches('0') {
            "" => whole.to_string(),
            fraction => format!("{whole}.{fraction}"),
        },
        None => rendered,
    })
}

/// Converts a JSON number of whole tokens to base units.
pub fn token_amount_from_f64(value: f64) -> Result<U256> {
    if !value.is_finite() || value < 0.0 {
        bail!("Token amount {value} must be a finite non-negative number");
    }
    parse_token_amount(&format!("{value}"))
}
