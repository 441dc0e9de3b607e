//! Action bitmask contract.
//!
//! Subscribers opt into domain actions through a bitmask. The engine only ever
//! compares masks through bitwise intersection, so the action type must be a
//! proper flags enumeration: each literal a distinct bit, an optional zero
//! literal, and combinations built from declared bits.
//!
//! Any `bitflags` type is an [`Actions`] type out of the box. Plain enums can
//! implement the trait by hand and report [`ActionShape::Enumeration`]; such
//! types are rejected by [`validate_actions`] when an engine is built.

use bitflags::Flags;

use crate::error::{DomainError, DomainResult};

/// How an action type declares its literals.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ActionShape {
    /// Literals are bit flags and may be combined.
    Flags,
    /// Literals are mutually exclusive values.
    Enumeration,
}

/// A set of domain actions that subscriptions can opt into.
pub trait Actions: Copy + Eq + core::fmt::Debug + Send + Sync + 'static {
    /// Declared shape of the type.
    fn shape() -> ActionShape;

    /// Named literals with their raw values.
    fn literals() -> Vec<(&'static str, u64)>;

    /// Raw bits of this value.
    fn bits(&self) -> u64;

    /// Rebuild a value from raw bits; `None` for bits the type does not know.
    fn from_bits(bits: u64) -> Option<Self>;

    /// Subscription matching rule: any shared bit.
    fn intersects(&self, other: Self) -> bool {
        self.bits() & other.bits() != 0
    }
}

impl<T> Actions for T
where
    T: Flags + Copy + Eq + core::fmt::Debug + Send + Sync + 'static,
    T::Bits: Into<u64> + TryFrom<u64>,
{
    fn shape() -> ActionShape {
        ActionShape::Flags
    }

    fn literals() -> Vec<(&'static str, u64)> {
        T::FLAGS
            .iter()
            .filter(|flag| !flag.name().is_empty())
            .map(|flag| (flag.name(), Flags::bits(flag.value()).into()))
            .collect()
    }

    fn bits(&self) -> u64 {
        Flags::bits(self).into()
    }

    fn from_bits(bits: u64) -> Option<Self> {
        let bits = T::Bits::try_from(bits).ok()?;
        <T as Flags>::from_bits(bits)
    }
}

/// Check once, at engine construction, that `A` is a proper flags bitmask.
pub fn validate_actions<A: Actions>() -> DomainResult<()> {
    let type_name = core::any::type_name::<A>();

    if A::shape() != ActionShape::Flags {
        return Err(DomainError::configuration(format!(
            "action type {type_name} is not a flags enumeration"
        )));
    }

    let literals = A::literals();

    let mut declared = 0u64;
    for (name, bits) in literals.iter().filter(|(_, bits)| bits.count_ones() == 1) {
        if declared & bits != 0 {
            return Err(DomainError::configuration(format!(
                "action {type_name}::{name} reuses bit {bits:#x}"
            )));
        }
        declared |= bits;
    }

    if declared == 0 {
        return Err(DomainError::configuration(format!(
            "action type {type_name} declares no single-bit actions"
        )));
    }

    for (name, bits) in literals.iter().filter(|(_, bits)| bits.count_ones() > 1) {
        let unknown = bits & !declared;
        if unknown != 0 {
            return Err(DomainError::configuration(format!(
                "action {type_name}::{name} combines undeclared bits {unknown:#x}"
            )));
        }
    }

    Ok(())
}

/// Names of the single-bit actions contained in `value`.
pub fn action_names<A: Actions>(value: A) -> Vec<&'static str> {
    let bits = value.bits();
    A::literals()
        .into_iter()
        .filter(|(_, flag)| flag.count_ones() == 1 && bits & flag != 0)
        .map(|(name, _)| name)
        .collect()
}

/// Build an action value from literal names (case-insensitive).
pub fn parse_action_names<A, I, N>(names: I) -> DomainResult<A>
where
    A: Actions,
    I: IntoIterator<Item = N>,
    N: AsRef<str>,
{
    let literals = A::literals();
    let mut bits = 0u64;

    for name in names {
        let name = name.as_ref();
        let (_, value) = literals
            .iter()
            .find(|(literal, _)| literal.eq_ignore_ascii_case(name))
            .ok_or_else(|| DomainError::validation(format!("unknown action: {name}")))?;
        bits |= value;
    }

    A::from_bits(bits).ok_or_else(|| DomainError::validation(format!("invalid action bits {bits:#x}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    bitflags::bitflags! {
        #[derive(Debug, Copy, Clone, PartialEq, Eq)]
        struct TestActions: u32 {
            const NONE = 0;
            const ACTION1 = 1 << 0;
            const ACTION2 = 1 << 1;
            const ACTION3 = 1 << 2;
            const ALL = Self::ACTION1.bits() | Self::ACTION2.bits() | Self::ACTION3.bits();
        }
    }

    bitflags::bitflags! {
        #[derive(Debug, Copy, Clone, PartialEq, Eq)]
        struct OverlappingActions: u8 {
            const A = 0b01;
            const B = 0b01;
        }
    }

    bitflags::bitflags! {
        #[derive(Debug, Copy, Clone, PartialEq, Eq)]
        struct DanglingCombination: u8 {
            const A = 0b001;
            const AC = 0b101;
        }
    }

    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    enum Sequential {
        First,
        Second,
        Third,
    }

    impl Actions for Sequential {
        fn shape() -> ActionShape {
            ActionShape::Enumeration
        }

        fn literals() -> Vec<(&'static str, u64)> {
            vec![("First", 0), ("Second", 1), ("Third", 2)]
        }

        fn bits(&self) -> u64 {
            *self as u64
        }

        fn from_bits(bits: u64) -> Option<Self> {
            match bits {
                0 => Some(Self::First),
                1 => Some(Self::Second),
                2 => Some(Self::Third),
                _ => None,
            }
        }
    }

    #[test]
    fn bitflags_types_validate() {
        assert_eq!(validate_actions::<TestActions>(), Ok(()));
    }

    #[test]
    fn enumerations_are_rejected() {
        let err = validate_actions::<Sequential>().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn duplicated_bits_are_rejected() {
        let err = validate_actions::<OverlappingActions>().unwrap_err();
        assert!(err.to_string().contains("reuses bit"));
    }

    #[test]
    fn combinations_must_use_declared_bits() {
        let err = validate_actions::<DanglingCombination>().unwrap_err();
        assert!(err.to_string().contains("undeclared bits"));
    }

    #[test]
    fn intersection_matches_combined_flags() {
        let all = TestActions::ALL;
        assert!(all.intersects(TestActions::ACTION1));
        assert!(!TestActions::ACTION2.intersects(TestActions::ACTION1));
        assert!(!TestActions::NONE.intersects(TestActions::ACTION1));
    }

    #[test]
    fn bits_round_trip_and_reject_unknown() {
        let value = TestActions::ACTION1 | TestActions::ACTION3;
        assert_eq!(<TestActions as Actions>::from_bits(Actions::bits(&value)), Some(value));
        assert_eq!(<TestActions as Actions>::from_bits(1 << 10), None);
        assert_eq!(<TestActions as Actions>::from_bits(u64::MAX), None);
    }

    #[test]
    fn names_list_single_bit_literals() {
        let names = action_names(TestActions::ACTION1 | TestActions::ACTION3);
        assert_eq!(names, vec!["ACTION1", "ACTION3"]);
        assert!(action_names(TestActions::NONE).is_empty());
    }

    #[test]
    fn parse_names_is_case_insensitive() {
        let parsed: TestActions = parse_action_names(["action1", "Action2"]).unwrap();
        assert_eq!(parsed, TestActions::ACTION1 | TestActions::ACTION2);

        let err = parse_action_names::<TestActions, _, _>(["nope"]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
