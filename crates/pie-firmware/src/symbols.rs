//! Address-range symbol map for post-crash diagnostics.

use std::fmt;

use crate::{FirmwareError, Result};

/// One line of the firmware map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub address: u32,
    pub size: u32,
    pub kind: String,
    pub name: String,
}

impl Symbol {
    /// Whether `address` lies in `[address, address + size)`.
    #[must_use]
    pub fn contains(&self, address: u32) -> bool {
        let end = u64::from(self.address) + u64::from(self.size);
        self.address <= address && u64::from(address) < end
    }
}

/// Symbols in file order.
///
/// Ranges may overlap; lookups return the last matching entry, so later
/// lines shadow earlier ones.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    #[must_use]
    pub const fn new(symbols: Vec<Symbol>) -> Self {
        Self { symbols }
    }

    /// Parse map text: `0xADDR\t0xSIZE\tKIND\tNAME` per line.
    ///
    /// Blank lines are skipped. Any other malformed line fails the whole
    /// parse.
    ///
    /// # Errors
    ///
    /// Returns [`FirmwareError::InvalidMap`] naming the 1-based line.
    pub fn parse(text: &str) -> Result<Self> {
        let mut symbols = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            symbols.push(parse_line(line).map_err(|reason| FirmwareError::InvalidMap {
                line: index + 1,
                reason,
            })?);
        }
        Ok(Self { symbols })
    }

    /// Last symbol (in file order) containing `address`.
    #[must_use]
    pub fn find(&self, address: u32) -> Option<&Symbol> {
        self.symbols.iter().rev().find(|s| s.contains(address))
    }

    #[must_use]
    pub fn resolve(&self, address: u32) -> Resolution {
        self.find(address).map_or(
            Resolution::Unresolved { address },
            |symbol| Resolution::Resolved {
                name: symbol.name.clone(),
                offset: address - symbol.address,
            },
        )
    }

    /// Resolve the program counter and link register independently.
    #[must_use]
    pub fn traceback(&self, pc: u32, lr: u32) -> Traceback {
        Traceback {
            pc: self.resolve(pc),
            lr: self.resolve(lr),
        }
    }

    /// Log a traceback for a stopped guest.
    pub fn print_traceback(&self, pc: u32, lr: u32) -> Traceback {
        let traceback = self.traceback(pc, lr);
        tracing::error!(pc = %traceback.pc, lr = %traceback.lr, "guest traceback");
        traceback
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

fn parse_line(line: &str) -> std::result::Result<Symbol, String> {
    let tokens: Vec<&str> = line.split('\t').collect();
    let [address, size, kind, name] = tokens.as_slice() else {
        return Err(format!("expected 4 fields, found {}", tokens.len()));
    };

    Ok(Symbol {
        address: parse_hex(address)?,
        size: parse_hex(size)?,
        kind: (*kind).to_string(),
        name: (*name).to_string(),
    })
}

fn parse_hex(s: &str) -> std::result::Result<u32, String> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| format!("missing 0x prefix in '{s}'"))?;
    u32::from_str_radix(digits, 16).map_err(|e| format!("bad hex '{s}': {e}"))
}

/// Where an address landed in the symbol map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Resolved { name: String, offset: u32 },
    Unresolved { address: u32 },
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved { name, offset } => write!(f, "{name} (+{offset:#x})"),
            Self::Unresolved { address } => write!(f, "(null) ({address:#x})"),
        }
    }
}

/// Resolved program counter and link register of a stopped guest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Traceback {
    pub pc: Resolution,
    pub lr: Resolution,
}

impl fmt::Display for Traceback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "last pc function : {}", self.pc)?;
        write!(f, "last lr function : {}", self.lr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_resolve() {
        let table = SymbolTable::parse("0x00001000\t0x00000040\tFUNC\tmain\n").expect("parse");
        assert_eq!(table.len(), 1);
        assert_eq!(table.resolve(0x1010).to_string(), "main (+0x10)");
        assert_eq!(table.resolve(0x1040).to_string(), "(null) (0x1040)");
        assert_eq!(table.resolve(0x0fff), Resolution::Unresolved { address: 0x0fff });
    }

    #[test]
    fn test_last_match_wins() {
        let text = "0x100\t0x10\tFUNC\ta\n0x100\t0x10\tFUNC\tb\n";
        let table = SymbolTable::parse(text).expect("parse");
        assert_eq!(table.find(0x105).map(|s| s.name.as_str()), Some("b"));
    }

    #[test]
    fn test_nested_range_shadowing() {
        let text = "0x100\t0x100\tFUNC\touter\n0x140\t0x10\tFUNC\tinner\n";
        let table = SymbolTable::parse(text).expect("parse");
        assert_eq!(table.find(0x145).map(|s| s.name.as_str()), Some("inner"));
        assert_eq!(table.find(0x150).map(|s| s.name.as_str()), Some("outer"));
    }

    #[test]
    fn test_blank_lines_skipped() {
        let text = "\n0x0\t0x4\tOBJECT\tvectors\n\n";
        let table = SymbolTable::parse(text).expect("parse");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_malformed_lines_fail() {
        let err = SymbolTable::parse("0x0\t0x4\tFUNC\tok\n0x10\t0x4\tFUNC\n").unwrap_err();
        assert!(matches!(err, FirmwareError::InvalidMap { line: 2, .. }));

        let err = SymbolTable::parse("100\t0x4\tFUNC\tf\n").unwrap_err();
        assert!(matches!(err, FirmwareError::InvalidMap { line: 1, .. }));

        assert!(SymbolTable::parse("0xzz\t0x4\tFUNC\tf\n").is_err());
    }

    #[test]
    fn test_traceback_format() {
        let table = SymbolTable::parse("0x08000100\t0x20\tFUNC\tmp_raise\n").expect("parse");
        let tb = table.traceback(0x0800_0104, 0x0900_0000);
        assert_eq!(
            tb.to_string(),
            "last pc function : mp_raise (+0x4)\nlast lr function : (null) (0x9000000)"
        );
    }
}
