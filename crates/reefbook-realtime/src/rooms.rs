//! Room addressing.
//!
//! A room is a named delivery target. Clients refer to rooms by wire
//! name (`"booking:<uuid>"`); the hub keys its membership maps on the
//! same strings.

use uuid::Uuid;

use reefbook_core::actor::Role;

/// A delivery target for pushed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    /// One user's private room. Every connection joins its own.
    Personal(Uuid),
    /// A role-wide broadcast room. Staff connections join theirs.
    Role(Role),
    /// All observers of one booking.
    Booking(Uuid),
    /// All observers of one experience session.
    Experience(Uuid),
}

impl Room {
    /// Wire name of the room.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Room::Personal(user_id) => format!("user:{user_id}"),
            Room::Role(role) => format!("role:{}", role.as_str()),
            Room::Booking(booking_id) => format!("booking:{booking_id}"),
            Room::Experience(experience_id) => format!("experience:{experience_id}"),
        }
    }

    /// Parse a wire name back into a room.
    #[must_use]
    pub fn parse(s: &str) -> Option<Room> {
        let (kind, rest) = s.split_once(':')?;
        match kind {
            "user" => Some(Room::Personal(Uuid::parse_str(rest).ok()?)),
            "role" => Some(Room::Role(Role::parse(rest)?)),
            "booking" => Some(Room::Booking(Uuid::parse_str(rest).ok()?)),
            "experience" => Some(Room::Experience(Uuid::parse_str(rest).ok()?)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_names_round_trip() {
        // Arrange
        let id = Uuid::new_v4();
        let rooms = [
            Room::Personal(id),
            Room::Role(Role::Admin),
            Room::Role(Role::Business),
            Room::Booking(id),
            Room::Experience(id),
        ];

        // Act & Assert
        for room in rooms {
            assert_eq!(Room::parse(&room.name()), Some(room));
        }
        assert_eq!(Room::Role(Role::Admin).name(), "role:admin");
        assert_eq!(Room::Booking(id).name(), format!("booking:{id}"));
    }

    #[test]
    fn test_rejects_malformed_room_names() {
        // Act & Assert
        assert_eq!(Room::parse("booking"), None);
        assert_eq!(Room::parse("booking:not-a-uuid"), None);
        assert_eq!(Room::parse("role:root"), None);
        assert_eq!(Room::parse(&format!("lounge:{}", Uuid::new_v4())), None);
        assert_eq!(Room::parse(""), None);
    }
}
