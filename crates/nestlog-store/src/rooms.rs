use nestlog_shared::constants::KEY_ROOM_INFO;
use nestlog_shared::RoomInfo;

use crate::database::Database;
use crate::error::Result;

impl Database {
    pub fn load_room(&self) -> Result<Option<RoomInfo>> {
        self.get_json(KEY_ROOM_INFO)
    }

    pub fn save_room(&self, room: &RoomInfo) -> Result<()> {
        self.put_json(KEY_ROOM_INFO, room)
    }

    /// Forget the joined room. Returns `true` if one was saved.
    pub fn clear_room(&self) -> Result<bool> {
        self.delete_value(KEY_ROOM_INFO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_save_load_clear() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.load_room().unwrap().is_none());

        let room = RoomInfo::new("65f0c1e2a9b8d7abcdef");
        db.save_room(&room).unwrap();
        assert_eq!(db.load_room().unwrap(), Some(room));

        assert!(db.clear_room().unwrap());
        assert!(db.load_room().unwrap().is_none());
    }
}
