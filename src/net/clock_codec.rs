use crate::error::CodecError;
use crate::net::bits::BitCursor;
use crate::world::time::GameDateTime;

pub const GAME_TIME_LEN: usize = 4;

pub fn write_game_time(cursor: &mut BitCursor, time: &GameDateTime) {
    cursor.write_int(u64::from(time.minute), 6);
    cursor.write_int(u64::from(time.hour), 5);
    cursor.write_int(u64::from(time.day), 5);
    cursor.write_int(u64::from(time.month), 4);
    cursor.write_int(u64::from(time.year), 12);
}

pub fn encode_game_time(time: &GameDateTime) -> [u8; GAME_TIME_LEN] {
    let mut cursor = BitCursor::with_capacity(GAME_TIME_LEN);
    write_game_time(&mut cursor, time);
    let mut out = [0u8; GAME_TIME_LEN];
    out.copy_from_slice(cursor.as_bytes());
    out
}

pub fn read_game_time(cursor: &mut BitCursor) -> Result<GameDateTime, CodecError> {
    let minute = cursor.read_int(6)? as u8;
    let hour = cursor.read_int(5)? as u8;
    let day = cursor.read_int(5)? as u8;
    let month = cursor.read_int(4)? as u8;
    let year = cursor.read_int(12)? as u16;
    Ok(GameDateTime {
        year,
        month,
        day,
        hour,
        minute,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_into_four_bytes() {
        let time = GameDateTime {
            year: 1,
            month: 0,
            day: 1,
            hour: 12,
            minute: 0,
        };
        // 000000 01100 00001 0000 000000000001
        assert_eq!(encode_game_time(&time), [0x01, 0x81, 0x00, 0x01]);
    }

    #[test]
    fn decodes_what_it_encodes() {
        let time = GameDateTime {
            year: 4095,
            month: 11,
            day: 30,
            hour: 23,
            minute: 59,
        };
        let mut cursor = BitCursor::from_bytes(encode_game_time(&time).to_vec());
        assert_eq!(read_game_time(&mut cursor).expect("time"), time);
    }
}
