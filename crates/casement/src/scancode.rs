//! Native scancode to portable key symbol lookup.
//!
//! Scancodes are USB-HID keyboard usage ids, which is what the native layer
//! reports for physical keys regardless of keyboard layout.

pub const KEY_A: &str = "a";
pub const KEY_RETURN: &str = "return";
pub const KEY_ESCAPE: &str = "escape";
pub const KEY_LEFT_CONTROL: &str = "left_control";
pub const KEY_LEFT_SHIFT: &str = "left_shift";
pub const KEY_LEFT_ALT: &str = "left_alt";
pub const KEY_LEFT_SUPER: &str = "left_super";
pub const KEY_RIGHT_CONTROL: &str = "right_control";
pub const KEY_RIGHT_SHIFT: &str = "right_shift";
pub const KEY_RIGHT_ALT: &str = "right_alt";
pub const KEY_RIGHT_SUPER: &str = "right_super";

/// Number of entries in the lookup table.
pub const TABLE_LEN: usize = 256;

/// Returns the portable symbol for `scancode`, or `""` if the code is
/// reserved, unassigned or out of range.
#[must_use]
pub fn symbol_for(scancode: u32) -> &'static str {
    let symbol = usize::try_from(scancode)
        .ok()
        .and_then(|i| KEY_MAP.get(i))
        .copied()
        .unwrap_or("");

    if symbol.is_empty() {
        log::trace!("no symbol for scancode {scancode}");
    }

    symbol
}

const KEY_MAP: [&str; TABLE_LEN] = {
    let mut table = [""; TABLE_LEN];

    // 0..=3 are reserved / error codes.
    table[4] = KEY_A;
    table[5] = "b";
    table[6] = "c";
    table[7] = "d";
    table[8] = "e";
    table[9] = "f";
    table[10] = "g";
    table[11] = "h";
    table[12] = "i";
    table[13] = "j";
    table[14] = "k";
    table[15] = "l";
    table[16] = "m";
    table[17] = "n";
    table[18] = "o";
    table[19] = "p";
    table[20] = "q";
    table[21] = "r";
    table[22] = "s";
    table[23] = "t";
    table[24] = "u";
    table[25] = "v";
    table[26] = "w";
    table[27] = "x";
    table[28] = "y";
    table[29] = "z";

    table[30] = "1";
    table[31] = "2";
    table[32] = "3";
    table[33] = "4";
    table[34] = "5";
    table[35] = "6";
    table[36] = "7";
    table[37] = "8";
    table[38] = "9";
    table[39] = "0";

    table[40] = KEY_RETURN;
    table[41] = KEY_ESCAPE;
    table[42] = "backspace";
    table[43] = "tab";
    table[44] = "space";
    table[45] = "-";
    table[46] = "=";
    table[47] = "[";
    table[48] = "]";
    table[49] = "\\";
    // 50 is the non-US '#' key, which has no portable symbol.
    table[51] = ";";
    table[52] = "'";
    table[53] = "`";
    table[54] = ",";
    table[55] = ".";
    table[56] = "/";
    table[57] = "capslock";

    table[58] = "f1";
    table[59] = "f2";
    table[60] = "f3";
    table[61] = "f4";
    table[62] = "f5";
    table[63] = "f6";
    table[64] = "f7";
    table[65] = "f8";
    table[66] = "f9";
    table[67] = "f10";
    table[68] = "f11";
    table[69] = "f12";

    table[70] = "print_screen";
    table[71] = "scroll_lock";
    table[72] = "pause";
    table[73] = "insert";
    table[74] = "home";
    table[75] = "prior";
    table[76] = "delete";
    table[77] = "end";
    table[78] = "next";
    table[79] = "right_arrow";
    table[80] = "left_arrow";
    table[81] = "down_arrow";
    table[82] = "up_arrow";
    table[83] = "numlock";

    table[224] = KEY_LEFT_CONTROL;
    table[225] = KEY_LEFT_SHIFT;
    table[226] = KEY_LEFT_ALT;
    table[227] = KEY_LEFT_SUPER;
    table[228] = KEY_RIGHT_CONTROL;
    table[229] = KEY_RIGHT_SHIFT;
    table[230] = KEY_RIGHT_ALT;
    table[231] = KEY_RIGHT_SUPER;

    table
};
