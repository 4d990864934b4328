use bitflags::bitflags;
use std::collections::BTreeMap;

bitflags! {
    /// PermissionFlags
    ///
    /// The bit-set vocabulary for entity rights. The four primitive bits cover
    /// CRUD-like access; every bit from `1 << 4` upward is a custom right whose
    /// display label is stored alongside the menu node that declares it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PermissionFlags: u32 {
        /// View a single record.
        const DETAIL = 1;
        /// Create new records.
        const INSERT = 1 << 1;
        /// Modify existing records.
        const UPDATE = 1 << 2;
        /// Remove records.
        const DELETE = 1 << 3;

        // Custom rights live above the primitive range and must survive
        // round trips through storage untouched.
        const _ = !0;
    }
}

/// The first bit of the extensible "Other" range.
pub const FIRST_CUSTOM_BIT: u32 = 1 << 4;

/// Display labels keyed by raw flag value, as stored on a menu node.
pub type PermissionLabels = BTreeMap<u32, String>;

impl PermissionFlags {
    /// The empty flag: no specific right is required.
    pub const NONE: PermissionFlags = PermissionFlags::empty();

    /// Every primitive bit.
    pub const ALL_PRIMITIVE: PermissionFlags = PermissionFlags::DETAIL
        .union(PermissionFlags::INSERT)
        .union(PermissionFlags::UPDATE)
        .union(PermissionFlags::DELETE);

    /// Builds a custom right from its offset into the "Other" range
    /// (`custom(0)` is bit 4).
    pub const fn custom(offset: u32) -> PermissionFlags {
        PermissionFlags::from_bits_retain(FIRST_CUSTOM_BIT << offset)
    }

    /// True for a non-empty value no larger than `DELETE`.
    pub fn is_primitive(&self) -> bool {
        !self.is_empty() && self.bits() <= PermissionFlags::DELETE.bits()
    }

    /// The fixed label of a single primitive bit.
    pub fn description(&self) -> Option<&'static str> {
        if *self == PermissionFlags::DETAIL {
            Some("Detail")
        } else if *self == PermissionFlags::INSERT {
            Some("Insert")
        } else if *self == PermissionFlags::UPDATE {
            Some("Update")
        } else if *self == PermissionFlags::DELETE {
            Some("Delete")
        } else {
            None
        }
    }
}

impl Default for PermissionFlags {
    fn default() -> Self {
        PermissionFlags::NONE
    }
}

impl serde::Serialize for PermissionFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> serde::Deserialize<'de> for PermissionFlags {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u32::deserialize(deserializer).map(PermissionFlags::from_bits_retain)
    }
}

/// has
///
/// A caller holding `rights` satisfies `required` when nothing specific is
/// required or when any of the required bits is held.
pub fn has(rights: PermissionFlags, required: PermissionFlags) -> bool {
    required.is_empty() || rights.intersects(required)
}

/// describe
///
/// Human-readable label for a flag: the built-in description for primitive
/// bits, otherwise the custom label recorded in `labels`.
pub fn describe(flag: PermissionFlags, labels: &PermissionLabels) -> String {
    if flag.is_empty() {
        return "None".to_string();
    }
    if let Some(fixed) = flag.description() {
        return fixed.to_string();
    }
    if PermissionFlags::ALL_PRIMITIVE.contains(flag) {
        return [
            PermissionFlags::DETAIL,
            PermissionFlags::INSERT,
            PermissionFlags::UPDATE,
            PermissionFlags::DELETE,
        ]
        .iter()
        .filter(|bit| flag.contains(**bit))
        .filter_map(|bit| bit.description())
        .collect::<Vec<_>>()
        .join(", ");
    }
    match labels.get(&flag.bits()) {
        Some(label) if !label.is_empty() => label.clone(),
        _ => format!("Custom(0x{:x})", flag.bits()),
    }
}
