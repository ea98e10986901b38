// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{fmt, str::FromStr, sync::OnceLock};

use regex::Regex;

use super::quantity;
use crate::{data_item::umas::UmasDataType, error::TagError};

/// Elements of an array or bytes of a STRING.
const MAX_QUANTITY: u16 = 1024;

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r"^(?P<name>[A-Za-z_%][A-Za-z0-9_.]*)",
            r"(?::(?P<data_type>[A-Za-z]+))?",
            r"(?:\[(?P<quantity>\d+)\])?$",
        ))
        .expect("valid UMAS tag pattern")
    })
}

/// A UMAS tag: the name of an unlocated variable.
///
/// Syntax: `NAME[:DATATYPE][[QUANTITY]]`, e.g. `MOTOR.SPEED:INT` or
/// `RECIPE:REAL[4]`. Without a data type the one from the PLC symbol
/// table is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UmasTag {
    pub name: String,
    pub data_type: Option<UmasDataType>,
    pub quantity: u16,
}

impl FromStr for UmasTag {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = pattern()
            .captures(s)
            .ok_or_else(|| TagError::Malformed(s.to_owned()))?;
        let data_type = captures
            .name("data_type")
            .map(|data_type| {
                UmasDataType::from_name(data_type.as_str())
                    .ok_or_else(|| TagError::UnknownDataType(data_type.as_str().to_owned()))
            })
            .transpose()?;
        Ok(Self {
            name: captures["name"].to_owned(),
            data_type,
            quantity: quantity(&captures, MAX_QUANTITY)?,
        })
    }
}

impl fmt::Display for UmasTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(data_type) = self.data_type {
            write!(f, ":{data_type}")?;
        }
        if self.quantity != 1 {
            write!(f, "[{}]", self.quantity)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_only() {
        let tag: UmasTag = "TESTING_INT".parse().unwrap();
        assert_eq!(tag.name, "TESTING_INT");
        assert_eq!(tag.data_type, None);
        assert_eq!(tag.quantity, 1);
    }

    #[test]
    fn structured_name_with_type_and_quantity() {
        let tag: UmasTag = "RECIPE.VALUES:real[4]".parse().unwrap();
        assert_eq!(tag.name, "RECIPE.VALUES");
        assert_eq!(tag.data_type, Some(UmasDataType::Real));
        assert_eq!(tag.quantity, 4);
        assert_eq!(tag.to_string(), "RECIPE.VALUES:REAL[4]");
    }

    #[test]
    fn invalid_tags() {
        assert!(matches!("".parse::<UmasTag>(), Err(TagError::Malformed(_))));
        assert!(matches!("1ABC".parse::<UmasTag>(), Err(TagError::Malformed(_))));
        assert!(matches!("A B".parse::<UmasTag>(), Err(TagError::Malformed(_))));
        assert!(matches!(
            "A:LREAL".parse::<UmasTag>(),
            Err(TagError::UnknownDataType(_))
        ));
        assert!(matches!(
            "A[2000]".parse::<UmasTag>(),
            Err(TagError::QuantityTooLarge { max: 1024, .. })
        ));
    }
}
