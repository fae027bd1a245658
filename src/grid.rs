//! Grid search parameter generation
//!
//! Expands a config's `grid` section into one config per parameter
//! combination, for the optimizer.

use itertools::Itertools;
use std::collections::BTreeMap;

use crate::Config;

/// Generate all config combinations from grid parameters
///
/// Each combination writes its values into the base config's `strategy`
/// section. Keys are visited in sorted order so the output is deterministic.
pub fn generate_grid_configs(config: &Config) -> Vec<Config> {
    let grid = match &config.grid {
        Some(g) if !g.is_empty() => g,
        _ => return vec![config.clone()], // No grid, return base config only
    };

    let mut keys: Vec<&String> = grid.keys().collect();
    keys.sort();

    keys.iter()
        .map(|k| grid[*k].iter())
        .multi_cartesian_product()
        .map(|values| {
            let mut cfg = config.clone();
            for (key, value) in keys.iter().zip(values) {
                cfg.set_strategy_param(key, value.clone());
            }
            cfg.grid = None;
            cfg
        })
        .collect()
}

/// Get total number of grid combinations
pub fn total_combinations(config: &Config) -> usize {
    match &config.grid {
        Some(grid) if !grid.is_empty() => grid.values().map(|v| v.len()).product(),
        _ => 1, // No grid = 1 combination (base config)
    }
}

/// Parse CLI override into grid format
/// Format: "param=val1,val2,val3"
pub fn parse_grid_override(s: &str) -> Option<(String, Vec<serde_json::Value>)> {
    let (key, raw_values) = s.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    let values: Vec<serde_json::Value> = raw_values
        .split(',')
        .filter_map(|v| {
            let v = v.trim();
            // Try parsing as number first, then as string
            if let Ok(n) = v.parse::<i64>() {
                Some(serde_json::json!(n))
            } else if let Ok(n) = v.parse::<f64>() {
                Some(serde_json::json!(n))
            } else if v == "true" || v == "false" {
                Some(serde_json::json!(v == "true"))
            } else if v == "null" {
                Some(serde_json::Value::Null)
            } else if !v.is_empty() {
                Some(serde_json::json!(v))
            } else {
                None
            }
        })
        .collect();

    if values.is_empty() {
        None
    } else {
        Some((key.to_string(), values))
    }
}

/// Apply CLI overrides to config grid
pub fn apply_overrides(config: &mut Config, overrides: &[String]) {
    for override_str in overrides {
        if let Some((key, values)) = parse_grid_override(override_str) {
            config.grid.get_or_insert_with(Default::default).insert(key, values);
        } else {
            tracing::warn!("Ignoring malformed grid override '{}'", override_str);
        }
    }
}

/// Strategy params of a config, rendered as display strings
pub fn extract_params(config: &Config) -> BTreeMap<String, String> {
    config
        .strategy
        .as_object()
        .map(|obj| {
            obj.iter()
                .map(|(k, v)| {
                    let rendered = match v {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), rendered)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Format params for display
pub fn format_params(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(k, _)| !k.starts_with('_')) // Skip internal params
        .map(|(k, v)| format!("{}={}", k, v))
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn config_with_grid(grid: &[(&str, Vec<serde_json::Value>)]) -> Config {
        let grid: HashMap<String, Vec<serde_json::Value>> = grid
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Config {
            strategy: json!({ "preset": "momentum" }),
            grid: Some(grid),
            ..Config::default()
        }
    }

    #[test]
    fn test_no_grid_returns_base() {
        let config = Config::default();
        let configs = generate_grid_configs(&config);
        assert_eq!(configs.len(), 1);
        assert_eq!(total_combinations(&config), 1);
    }

    #[test]
    fn test_cartesian_product() {
        let config = config_with_grid(&[
            ("rsi_buy_max", vec![json!(30), json!(35), json!(40)]),
            ("ma_short", vec![json!(5), json!(9)]),
        ]);
        let configs = generate_grid_configs(&config);
        assert_eq!(configs.len(), 6);
        assert_eq!(total_combinations(&config), 6);

        // sorted keys: ma_short varies slowest
        assert_eq!(configs[0].strategy["ma_short"], 5);
        assert_eq!(configs[0].strategy["rsi_buy_max"], 30);
        assert_eq!(configs[1].strategy["rsi_buy_max"], 35);
        assert_eq!(configs[5].strategy["ma_short"], 9);
        assert_eq!(configs[5].strategy["rsi_buy_max"], 40);

        // base params survive, grid is consumed
        assert!(configs.iter().all(|c| c.strategy["preset"] == "momentum"));
        assert!(configs.iter().all(|c| c.grid.is_none()));
    }

    #[test]
    fn test_parse_grid_override() {
        let (key, values) = parse_grid_override("volume_multiplier_min=1.0, 1.05,1.1").unwrap();
        assert_eq!(key, "volume_multiplier_min");
        assert_eq!(values, vec![json!(1.0), json!(1.05), json!(1.1)]);

        let (_, values) = parse_grid_override("momentum_min=null,1.0025").unwrap();
        assert_eq!(values[0], serde_json::Value::Null);

        let (_, values) = parse_grid_override("lower_band_filter=true,false").unwrap();
        assert_eq!(values, vec![json!(true), json!(false)]);

        assert!(parse_grid_override("no_equals").is_none());
        assert!(parse_grid_override("key=").is_none());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = Config::default();
        apply_overrides(&mut config, &["ma_short=5,7".to_string(), "bogus".to_string()]);
        assert_eq!(total_combinations(&config), 2);
    }

    #[test]
    fn test_format_params() {
        let config = Config {
            strategy: json!({ "preset": "classic", "ma_short": 5, "_note": "x" }),
            ..Config::default()
        };
        let params = extract_params(&config);
        assert_eq!(format_params(&params), "ma_short=5, preset=classic");
    }
}
