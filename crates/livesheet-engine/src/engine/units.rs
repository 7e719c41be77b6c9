//! Unit registry: built-in units plus units defined at runtime.
//!
//! Every unit resolves to a scale factor relative to its base dimensions
//! and a dimension vector (`length^1 time^-1`, ...). Units created at
//! runtime without a definition become new base dimensions of their own,
//! which is how currencies and ad-hoc counting units (`apples`) work.
//!
//! The registry is a cheap cloneable handle. All clones share the same
//! runtime table, so units defined through one engine are visible to every
//! engine built from the same registry.

use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

use super::value::out_of_range;
use crate::error::{EngineError, Result};

/// Base-dimension exponents, keyed by dimension name.
pub type Dimensions = BTreeMap<String, i32>;

/// Resolved definition of a unit.
#[derive(Clone, Debug, PartialEq)]
pub struct UnitDef {
    /// Multiplier to convert one of this unit into base-dimension units.
    pub factor: f64,
    pub dimensions: Dimensions,
}

impl UnitDef {
    pub fn base(dimension: &str) -> UnitDef {
        let mut dimensions = Dimensions::new();
        dimensions.insert(dimension.to_string(), 1);
        UnitDef {
            factor: 1.0,
            dimensions,
        }
    }
}

struct BuiltinUnit {
    names: &'static [&'static str],
    factor: f64,
    dimensions: &'static [(&'static str, i32)],
}

const LENGTH: &[(&str, i32)] = &[("length", 1)];
const MASS: &[(&str, i32)] = &[("mass", 1)];
const TIME: &[(&str, i32)] = &[("time", 1)];
const AREA: &[(&str, i32)] = &[("length", 2)];
const VOLUME: &[(&str, i32)] = &[("length", 3)];
const FREQUENCY: &[(&str, i32)] = &[("time", -1)];
const FORCE: &[(&str, i32)] = &[("mass", 1), ("length", 1), ("time", -2)];
const ENERGY: &[(&str, i32)] = &[("mass", 1), ("length", 2), ("time", -2)];
const POWER: &[(&str, i32)] = &[("mass", 1), ("length", 2), ("time", -3)];
const PRESSURE: &[(&str, i32)] = &[("mass", 1), ("length", -1), ("time", -2)];
const CURRENT: &[(&str, i32)] = &[("current", 1)];
const VOLTAGE: &[(&str, i32)] = &[("mass", 1), ("length", 2), ("time", -3), ("current", -1)];
const ANGLE: &[(&str, i32)] = &[("angle", 1)];
const DATA: &[(&str, i32)] = &[("bit", 1)];

const BUILTIN_UNITS: &[BuiltinUnit] = &[
    // Length
    BuiltinUnit { names: &["m", "meter", "meters", "metre", "metres"], factor: 1.0, dimensions: LENGTH },
    BuiltinUnit { names: &["km", "kilometer", "kilometers"], factor: 1e3, dimensions: LENGTH },
    BuiltinUnit { names: &["cm", "centimeter", "centimeters"], factor: 1e-2, dimensions: LENGTH },
    BuiltinUnit { names: &["mm", "millimeter", "millimeters"], factor: 1e-3, dimensions: LENGTH },
    BuiltinUnit { names: &["um", "micrometer"], factor: 1e-6, dimensions: LENGTH },
    BuiltinUnit { names: &["nm", "nanometer"], factor: 1e-9, dimensions: LENGTH },
    BuiltinUnit { names: &["inch", "inches"], factor: 0.0254, dimensions: LENGTH },
    BuiltinUnit { names: &["ft", "foot", "feet"], factor: 0.3048, dimensions: LENGTH },
    BuiltinUnit { names: &["yd", "yard", "yards"], factor: 0.9144, dimensions: LENGTH },
    BuiltinUnit { names: &["mi", "mile", "miles"], factor: 1609.344, dimensions: LENGTH },
    // Mass
    BuiltinUnit { names: &["kg", "kilogram", "kilograms"], factor: 1.0, dimensions: MASS },
    BuiltinUnit { names: &["g", "gram", "grams"], factor: 1e-3, dimensions: MASS },
    BuiltinUnit { names: &["mg", "milligram", "milligrams"], factor: 1e-6, dimensions: MASS },
    BuiltinUnit { names: &["t", "tonne", "tonnes"], factor: 1e3, dimensions: MASS },
    BuiltinUnit { names: &["ton", "tons"], factor: 907.18474, dimensions: MASS },
    BuiltinUnit { names: &["lb", "lbs", "pound", "pounds"], factor: 0.45359237, dimensions: MASS },
    BuiltinUnit { names: &["oz", "ounce", "ounces"], factor: 0.028349523125, dimensions: MASS },
    // Time
    BuiltinUnit { names: &["s", "sec", "second", "seconds"], factor: 1.0, dimensions: TIME },
    BuiltinUnit { names: &["ms", "millisecond", "milliseconds"], factor: 1e-3, dimensions: TIME },
    BuiltinUnit { names: &["min", "minute", "minutes"], factor: 60.0, dimensions: TIME },
    BuiltinUnit { names: &["h", "hr", "hour", "hours"], factor: 3600.0, dimensions: TIME },
    BuiltinUnit { names: &["day", "days"], factor: 86400.0, dimensions: TIME },
    BuiltinUnit { names: &["week", "weeks"], factor: 604800.0, dimensions: TIME },
    BuiltinUnit { names: &["month", "months"], factor: 2629800.0, dimensions: TIME },
    BuiltinUnit { names: &["year", "years"], factor: 31557600.0, dimensions: TIME },
    // Area
    BuiltinUnit { names: &["hectare", "hectares"], factor: 1e4, dimensions: AREA },
    BuiltinUnit { names: &["acre", "acres"], factor: 4046.8564224, dimensions: AREA },
    // Volume
    BuiltinUnit { names: &["l", "L", "liter", "liters", "litre", "litres"], factor: 1e-3, dimensions: VOLUME },
    BuiltinUnit { names: &["ml", "mL", "milliliter", "milliliters"], factor: 1e-6, dimensions: VOLUME },
    BuiltinUnit { names: &["cl", "cL"], factor: 1e-5, dimensions: VOLUME },
    BuiltinUnit { names: &["dl", "dL"], factor: 1e-4, dimensions: VOLUME },
    BuiltinUnit { names: &["gal", "gallon", "gallons"], factor: 3.785411784e-3, dimensions: VOLUME },
    // Frequency
    BuiltinUnit { names: &["Hz", "hertz"], factor: 1.0, dimensions: FREQUENCY },
    BuiltinUnit { names: &["kHz"], factor: 1e3, dimensions: FREQUENCY },
    BuiltinUnit { names: &["MHz"], factor: 1e6, dimensions: FREQUENCY },
    BuiltinUnit { names: &["GHz"], factor: 1e9, dimensions: FREQUENCY },
    // Force, energy, power, pressure
    BuiltinUnit { names: &["N", "newton", "newtons"], factor: 1.0, dimensions: FORCE },
    BuiltinUnit { names: &["kN"], factor: 1e3, dimensions: FORCE },
    BuiltinUnit { names: &["J", "joule", "joules"], factor: 1.0, dimensions: ENERGY },
    BuiltinUnit { names: &["kJ"], factor: 1e3, dimensions: ENERGY },
    BuiltinUnit { names: &["cal", "calorie", "calories"], factor: 4.1868, dimensions: ENERGY },
    BuiltinUnit { names: &["kcal"], factor: 4186.8, dimensions: ENERGY },
    BuiltinUnit { names: &["Wh"], factor: 3600.0, dimensions: ENERGY },
    BuiltinUnit { names: &["kWh"], factor: 3.6e6, dimensions: ENERGY },
    BuiltinUnit { names: &["W", "watt", "watts"], factor: 1.0, dimensions: POWER },
    BuiltinUnit { names: &["kW"], factor: 1e3, dimensions: POWER },
    BuiltinUnit { names: &["MW"], factor: 1e6, dimensions: POWER },
    BuiltinUnit { names: &["hp"], factor: 745.6998715822702, dimensions: POWER },
    BuiltinUnit { names: &["Pa", "pascal"], factor: 1.0, dimensions: PRESSURE },
    BuiltinUnit { names: &["kPa"], factor: 1e3, dimensions: PRESSURE },
    BuiltinUnit { names: &["bar"], factor: 1e5, dimensions: PRESSURE },
    BuiltinUnit { names: &["psi"], factor: 6894.757293168361, dimensions: PRESSURE },
    BuiltinUnit { names: &["atm"], factor: 101325.0, dimensions: PRESSURE },
    // Electrical
    BuiltinUnit { names: &["A", "ampere", "amperes"], factor: 1.0, dimensions: CURRENT },
    BuiltinUnit { names: &["mA"], factor: 1e-3, dimensions: CURRENT },
    BuiltinUnit { names: &["V", "volt", "volts"], factor: 1.0, dimensions: VOLTAGE },
    // Angle
    BuiltinUnit { names: &["rad", "radian", "radians"], factor: 1.0, dimensions: ANGLE },
    BuiltinUnit { names: &["deg", "degree", "degrees"], factor: std::f64::consts::PI / 180.0, dimensions: ANGLE },
    // Data
    BuiltinUnit { names: &["b", "bit", "bits"], factor: 1.0, dimensions: DATA },
    BuiltinUnit { names: &["B", "byte", "bytes"], factor: 8.0, dimensions: DATA },
    BuiltinUnit { names: &["kB"], factor: 8e3, dimensions: DATA },
    BuiltinUnit { names: &["MB"], factor: 8e6, dimensions: DATA },
    BuiltinUnit { names: &["GB"], factor: 8e9, dimensions: DATA },
    BuiltinUnit { names: &["TB"], factor: 8e12, dimensions: DATA },
    BuiltinUnit { names: &["KiB"], factor: 8.0 * 1024.0, dimensions: DATA },
    BuiltinUnit { names: &["MiB"], factor: 8.0 * 1024.0 * 1024.0, dimensions: DATA },
    BuiltinUnit { names: &["GiB"], factor: 8.0 * 1024.0 * 1024.0 * 1024.0, dimensions: DATA },
];

fn builtin_table() -> &'static HashMap<&'static str, UnitDef> {
    static TABLE: OnceLock<HashMap<&'static str, UnitDef>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = HashMap::new();
        for unit in BUILTIN_UNITS {
            let dimensions = unit
                .dimensions
                .iter()
                .map(|(name, power)| (name.to_string(), *power))
                .collect();
            let def = UnitDef {
                factor: unit.factor,
                dimensions,
            };
            for name in unit.names {
                table.insert(*name, def.clone());
            }
        }
        table
    })
}

/// Whether `name` is one of the units the engine ships with.
pub fn is_builtin_unit(name: &str) -> bool {
    builtin_table().contains_key(name)
}

/// Shared table of units known to an engine.
#[derive(Clone, Default)]
pub struct UnitRegistry {
    defined: Arc<DashMap<String, UnitDef>>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a unit by name; runtime definitions shadow nothing since
    /// built-in names cannot be redefined.
    pub fn get(&self, name: &str) -> Option<UnitDef> {
        if let Some(def) = builtin_table().get(name) {
            return Some(def.clone());
        }
        self.defined.get(name).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        builtin_table().contains_key(name) || self.defined.contains_key(name)
    }

    /// Whether the unit was created at runtime.
    pub fn is_user_defined(&self, name: &str) -> bool {
        self.defined.contains_key(name)
    }

    /// Insert or replace a runtime unit. Last write wins.
    pub fn define(&self, name: &str, def: UnitDef) -> Result<()> {
        if is_builtin_unit(name) {
            return Err(EngineError::unit(format!(
                "Cannot redefine built-in unit {}",
                name
            )));
        }
        if !is_valid_unit_name(name) {
            return Err(EngineError::unit(format!("Invalid unit name \"{}\"", name)));
        }
        tracing::debug!(unit = name, factor = def.factor, "defining unit");
        self.defined.insert(name.to_string(), def);
        Ok(())
    }

    /// Names of all runtime units, sorted.
    pub fn user_units(&self) -> Vec<String> {
        let mut names: Vec<String> = self.defined.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Resolve a product of unit powers to a combined factor and dimensions.
    pub fn resolve(&self, parts: &[(String, i32)]) -> Result<UnitDef> {
        let mut factor = 1.0;
        let mut dimensions = Dimensions::new();
        for (name, power) in parts {
            let def = self
                .get(name)
                .ok_or_else(|| EngineError::UndefinedSymbol(name.clone()))?;
            factor *= def.factor.powi(*power);
            for (dim, exp) in &def.dimensions {
                let entry = dimensions.entry(dim.clone()).or_insert(0);
                let current = *entry;
                *entry = exp
                    .checked_mul(*power)
                    .and_then(|scaled| current.checked_add(scaled))
                    .ok_or_else(out_of_range)?;
            }
        }
        dimensions.retain(|_, exp| *exp != 0);
        Ok(UnitDef { factor, dimensions })
    }
}

fn is_valid_unit_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}
