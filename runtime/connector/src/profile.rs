//! Profiles - Device-resident configuration sets
//!
//! A profile owns the user objects created while it is active. At most one
//! profile is active per controller; on the wire `-1` means none.

use core::fmt;

use crate::controller::Controller;
use crate::error::Result;
use crate::reference::ObjectReference;

/// Wire value meaning "no active profile"
pub const NO_PROFILE: i32 = -1;

/// Device-assigned profile id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProfileId(u8);

impl ProfileId {
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// Interpret a raw device id; negative (or out of range) means no profile
    pub fn from_wire(raw: i32) -> Option<Self> {
        u8::try_from(raw).ok().map(Self)
    }

    /// Wire form of an optional profile
    pub fn to_wire(profile: Option<ProfileId>) -> i32 {
        profile.map_or(NO_PROFILE, |p| i32::from(p.0))
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Proxy for a profile stored on the device
#[derive(Clone, Copy)]
pub struct Profile<'c> {
    controller: &'c Controller,
    id: ProfileId,
}

impl<'c> Profile<'c> {
    pub(crate) fn new(controller: &'c Controller, id: ProfileId) -> Self {
        Self { controller, id }
    }

    pub fn id(&self) -> ProfileId {
        self.id
    }

    /// Make this the active profile
    pub fn activate(&self) -> Result<()> {
        self.controller.activate_profile(Some(self.id))
    }

    /// Deactivate this profile if it is the active one
    pub fn deactivate(&self) -> Result<()> {
        if self.is_active()? {
            self.controller.activate_profile(None)?;
        }
        Ok(())
    }

    pub fn is_active(&self) -> Result<bool> {
        self.controller.is_active_profile(self.id)
    }

    /// References to every object stored in this profile
    pub fn objects(&self) -> Result<Vec<ObjectReference>> {
        self.controller.list_objects(self.id)
    }

    /// Delete the profile on the device
    pub fn delete(self) -> Result<()> {
        self.controller.delete_profile(self.id)
    }
}

impl fmt::Debug for Profile<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Profile").field(&self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_sentinel() {
        assert_eq!(ProfileId::from_wire(-1), None);
        assert_eq!(ProfileId::from_wire(-42), None);
        assert_eq!(ProfileId::from_wire(2), Some(ProfileId::new(2)));
        assert_eq!(ProfileId::to_wire(None), NO_PROFILE);
        assert_eq!(ProfileId::to_wire(Some(ProfileId::new(3))), 3);
    }
}
