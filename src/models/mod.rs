pub mod faucet;
pub mod launcher;

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(serde_json::Number),
    Text(String),
}

/// Reads a chain id sent either as a JSON number or a numeric string. Anything that
/// is not a positive integer becomes `None`, which callers report as an invalid chain.
pub fn lenient_chain_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NumberOrText>::deserialize(deserializer).unwrap_or(None);
    Ok(raw.and_then(|value| match value {
        NumberOrText::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f > 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        NumberOrText::Text(text) => parse_chain_id(&text),
    })
    .filter(|id| *id > 0))
}

pub fn parse_chain_id(text: &str) -> Option<u64> {
    text.trim().parse::<u64>().ok().filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct ChainIdField {
        #[serde(default, deserialize_with = "lenient_chain_id")]
        chain_id: Option<u64>,
    }

    fn chain_id_of(value: serde_json::Value) -> Option<u64> {
        serde_json::from_value::<ChainIdField>(json!({ "chain_id": value }))
            .expect("lenient field always deserializes")
            .chain_id
    }

    #[test]
    fn accepts_numbers_and_numeric_strings() {
        assert_eq!(chain_id_of(json!(80001)), Some(80001));
        assert_eq!(chain_id_of(json!("1338")), Some(1338));
        assert_eq!(chain_id_of(json!(5.0)), Some(5));
    }

    #[test]
    fn rejects_everything_else() {
        assert_eq!(chain_id_of(json!(0)), None);
        assert_eq!(chain_id_of(json!("abc")), None);
        assert_eq!(chain_id_of(json!(1.5)), None);
        assert_eq!(chain_id_of(json!(null)), None);
        assert_eq!(chain_id_of(json!(-4)), None);
        assert_eq!(chain_id_of(json!(true)), None);
    }
}
