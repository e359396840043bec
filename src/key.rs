//! Key identities, the physical layout table, and positional panning
//!
//! Keys are identified by their Linux evdev code; the Windows hook
//! translates virtual-key codes into this space before events leave the
//! input layer, so profiles and hotkey files are portable across platforms.

use parking_lot::RwLock;

/// The position of a key on a standard ANSI-like keyboard, in key units.
/// `x` grows rightward from Escape, `y` grows downward from the function row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPosition {
    pub x: u32,
    pub y: u32,
}

/// A key on a keyboard.
#[derive(Debug, Clone, Copy)]
pub struct Key {
    /// Canonical key code (Linux evdev `KEY_*` value).
    pub code: u32,
    /// Human-readable name, as referenced by profiles and hotkey files.
    pub name: &'static str,
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Key {}

impl std::hash::Hash for Key {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.code.hash(state);
    }
}

macro_rules! keys {
    ($($konst:ident = ($code:expr, $name:expr);)+) => {
        $(pub const $konst: Key = Key { code: $code, name: $name };)+

        /// Every key with a defined name.
        pub static ALL_KEYS: &[Key] = &[$($konst),+];
    };
}

keys! {
    ESCAPE = (1, "Escape");
    NUMBER1 = (2, "Number1");
    NUMBER2 = (3, "Number2");
    NUMBER3 = (4, "Number3");
    NUMBER4 = (5, "Number4");
    NUMBER5 = (6, "Number5");
    NUMBER6 = (7, "Number6");
    NUMBER7 = (8, "Number7");
    NUMBER8 = (9, "Number8");
    NUMBER9 = (10, "Number9");
    NUMBER0 = (11, "Number0");
    MINUS = (12, "Minus");
    PLUS = (13, "Plus");
    BACKSPACE = (14, "Backspace");
    TAB = (15, "Tab");
    Q = (16, "Q");
    W = (17, "W");
    E = (18, "E");
    R = (19, "R");
    T = (20, "T");
    Y = (21, "Y");
    U = (22, "U");
    I = (23, "I");
    O = (24, "O");
    P = (25, "P");
    LEFT_BRACKET = (26, "LeftBracket");
    RIGHT_BRACKET = (27, "RightBracket");
    ENTER = (28, "Enter");
    LEFT_CONTROL = (29, "LeftControl");
    A = (30, "A");
    S = (31, "S");
    D = (32, "D");
    F = (33, "F");
    G = (34, "G");
    H = (35, "H");
    J = (36, "J");
    K = (37, "K");
    L = (38, "L");
    SEMICOLON = (39, "SemiColon");
    QUOTE = (40, "Quote");
    BACKTICK = (41, "Backtick");
    LEFT_SHIFT = (42, "LeftShift");
    BACKSLASH = (43, "Backslash");
    Z = (44, "Z");
    X = (45, "X");
    C = (46, "C");
    V = (47, "V");
    B = (48, "B");
    N = (49, "N");
    M = (50, "M");
    COMMA = (51, "Comma");
    PERIOD = (52, "Period");
    SLASH = (53, "Slash");
    RIGHT_SHIFT = (54, "RightShift");
    NUMPAD_MULTIPLY = (55, "NumPadMultiply");
    LEFT_ALT = (56, "LeftAlt");
    SPACE = (57, "Space");
    CAPS_LOCK = (58, "CapsLock");
    F1 = (59, "F1");
    F2 = (60, "F2");
    F3 = (61, "F3");
    F4 = (62, "F4");
    F5 = (63, "F5");
    F6 = (64, "F6");
    F7 = (65, "F7");
    F8 = (66, "F8");
    F9 = (67, "F9");
    F10 = (68, "F10");
    NUM_LOCK = (69, "NumLock");
    SCROLL_LOCK = (70, "ScrollLock");
    NUMPAD7 = (71, "NumPad7");
    NUMPAD8 = (72, "NumPad8");
    NUMPAD9 = (73, "NumPad9");
    NUMPAD_SUBTRACT = (74, "NumPadSubtract");
    NUMPAD4 = (75, "NumPad4");
    NUMPAD5 = (76, "NumPad5");
    NUMPAD6 = (77, "NumPad6");
    NUMPAD_ADD = (78, "NumPadAdd");
    NUMPAD1 = (79, "NumPad1");
    NUMPAD2 = (80, "NumPad2");
    NUMPAD3 = (81, "NumPad3");
    NUMPAD0 = (82, "NumPad0");
    NUMPAD_DECIMAL = (83, "NumPadDecimal");
    F11 = (87, "F11");
    F12 = (88, "F12");
    RIGHT_CONTROL = (97, "RightControl");
    NUMPAD_DIVIDE = (98, "NumPadDivide");
    PRINT_SCREEN = (99, "PrintScreen");
    RIGHT_ALT = (100, "RightAlt");
    HOME = (102, "Home");
    UP = (103, "Up");
    PAGE_UP = (104, "PageUp");
    LEFT = (105, "Left");
    RIGHT = (106, "Right");
    END = (107, "End");
    DOWN = (108, "Down");
    PAGE_DOWN = (109, "PageDown");
    INSERT = (110, "Insert");
    DELETE = (111, "Delete");
    PAUSE = (119, "Pause");
    LEFT_WIN = (125, "LeftWin");
    RIGHT_WIN = (126, "RightWin");
    F13 = (183, "F13");
    F14 = (184, "F14");
    F15 = (185, "F15");
    F16 = (186, "F16");
    F17 = (187, "F17");
    F18 = (188, "F18");
    F19 = (189, "F19");
    F20 = (190, "F20");
    F21 = (191, "F21");
    F22 = (192, "F22");
    F23 = (193, "F23");
    F24 = (194, "F24");
}

/// Key positions on a 6-row ANSI layout plus the numpad cluster.
/// Keys absent from this table (media keys, exotic layouts) have no
/// position and pan to center.
static KEY_POSITIONS: &[(u32, KeyPosition)] = &[
    // Row 0 - Function row
    (ESCAPE.code, KeyPosition { x: 0, y: 0 }),
    (F1.code, KeyPosition { x: 1, y: 0 }),
    (F2.code, KeyPosition { x: 2, y: 0 }),
    (F3.code, KeyPosition { x: 3, y: 0 }),
    (F4.code, KeyPosition { x: 4, y: 0 }),
    (F5.code, KeyPosition { x: 5, y: 0 }),
    (F6.code, KeyPosition { x: 6, y: 0 }),
    (F7.code, KeyPosition { x: 7, y: 0 }),
    (F8.code, KeyPosition { x: 8, y: 0 }),
    (F9.code, KeyPosition { x: 9, y: 0 }),
    (F10.code, KeyPosition { x: 10, y: 0 }),
    (F11.code, KeyPosition { x: 11, y: 0 }),
    (F12.code, KeyPosition { x: 12, y: 0 }),
    (SCROLL_LOCK.code, KeyPosition { x: 14, y: 0 }),
    // Row 1 - Number row
    (BACKTICK.code, KeyPosition { x: 0, y: 1 }),
    (NUMBER1.code, KeyPosition { x: 1, y: 1 }),
    (NUMBER2.code, KeyPosition { x: 2, y: 1 }),
    (NUMBER3.code, KeyPosition { x: 3, y: 1 }),
    (NUMBER4.code, KeyPosition { x: 4, y: 1 }),
    (NUMBER5.code, KeyPosition { x: 5, y: 1 }),
    (NUMBER6.code, KeyPosition { x: 6, y: 1 }),
    (NUMBER7.code, KeyPosition { x: 7, y: 1 }),
    (NUMBER8.code, KeyPosition { x: 8, y: 1 }),
    (NUMBER9.code, KeyPosition { x: 9, y: 1 }),
    (NUMBER0.code, KeyPosition { x: 10, y: 1 }),
    (MINUS.code, KeyPosition { x: 11, y: 1 }),
    (PLUS.code, KeyPosition { x: 12, y: 1 }),
    (BACKSPACE.code, KeyPosition { x: 13, y: 1 }),
    (INSERT.code, KeyPosition { x: 15, y: 1 }),
    (HOME.code, KeyPosition { x: 16, y: 1 }),
    (PAGE_UP.code, KeyPosition { x: 17, y: 1 }),
    (NUM_LOCK.code, KeyPosition { x: 18, y: 1 }),
    (NUMPAD_DIVIDE.code, KeyPosition { x: 19, y: 1 }),
    (NUMPAD_MULTIPLY.code, KeyPosition { x: 20, y: 1 }),
    (NUMPAD_SUBTRACT.code, KeyPosition { x: 21, y: 1 }),
    // Row 2 - QWERTY row
    (TAB.code, KeyPosition { x: 0, y: 2 }),
    (Q.code, KeyPosition { x: 1, y: 2 }),
    (W.code, KeyPosition { x: 2, y: 2 }),
    (E.code, KeyPosition { x: 3, y: 2 }),
    (R.code, KeyPosition { x: 4, y: 2 }),
    (T.code, KeyPosition { x: 5, y: 2 }),
    (Y.code, KeyPosition { x: 6, y: 2 }),
    (U.code, KeyPosition { x: 7, y: 2 }),
    (I.code, KeyPosition { x: 8, y: 2 }),
    (O.code, KeyPosition { x: 9, y: 2 }),
    (P.code, KeyPosition { x: 10, y: 2 }),
    (LEFT_BRACKET.code, KeyPosition { x: 11, y: 2 }),
    (RIGHT_BRACKET.code, KeyPosition { x: 12, y: 2 }),
    (BACKSLASH.code, KeyPosition { x: 13, y: 2 }),
    (DELETE.code, KeyPosition { x: 15, y: 2 }),
    (END.code, KeyPosition { x: 16, y: 2 }),
    (PAGE_DOWN.code, KeyPosition { x: 17, y: 2 }),
    (NUMPAD7.code, KeyPosition { x: 18, y: 2 }),
    (NUMPAD8.code, KeyPosition { x: 19, y: 2 }),
    (NUMPAD9.code, KeyPosition { x: 20, y: 2 }),
    (NUMPAD_ADD.code, KeyPosition { x: 21, y: 2 }),
    // Row 3 - Home row
    (CAPS_LOCK.code, KeyPosition { x: 0, y: 3 }),
    (A.code, KeyPosition { x: 1, y: 3 }),
    (S.code, KeyPosition { x: 2, y: 3 }),
    (D.code, KeyPosition { x: 3, y: 3 }),
    (F.code, KeyPosition { x: 4, y: 3 }),
    (G.code, KeyPosition { x: 5, y: 3 }),
    (H.code, KeyPosition { x: 6, y: 3 }),
    (J.code, KeyPosition { x: 7, y: 3 }),
    (K.code, KeyPosition { x: 8, y: 3 }),
    (L.code, KeyPosition { x: 9, y: 3 }),
    (SEMICOLON.code, KeyPosition { x: 10, y: 3 }),
    (QUOTE.code, KeyPosition { x: 11, y: 3 }),
    (ENTER.code, KeyPosition { x: 12, y: 3 }),
    (NUMPAD4.code, KeyPosition { x: 18, y: 3 }),
    (NUMPAD5.code, KeyPosition { x: 19, y: 3 }),
    (NUMPAD6.code, KeyPosition { x: 20, y: 3 }),
    // Row 4 - Bottom letter row
    (LEFT_SHIFT.code, KeyPosition { x: 0, y: 4 }),
    (Z.code, KeyPosition { x: 1, y: 4 }),
    (X.code, KeyPosition { x: 2, y: 4 }),
    (C.code, KeyPosition { x: 3, y: 4 }),
    (V.code, KeyPosition { x: 4, y: 4 }),
    (B.code, KeyPosition { x: 5, y: 4 }),
    (N.code, KeyPosition { x: 6, y: 4 }),
    (M.code, KeyPosition { x: 7, y: 4 }),
    (COMMA.code, KeyPosition { x: 8, y: 4 }),
    (PERIOD.code, KeyPosition { x: 9, y: 4 }),
    (SLASH.code, KeyPosition { x: 10, y: 4 }),
    (RIGHT_SHIFT.code, KeyPosition { x: 11, y: 4 }),
    (UP.code, KeyPosition { x: 16, y: 4 }),
    (NUMPAD1.code, KeyPosition { x: 18, y: 4 }),
    (NUMPAD2.code, KeyPosition { x: 19, y: 4 }),
    (NUMPAD3.code, KeyPosition { x: 20, y: 4 }),
    // Row 5 - Modifier row
    (LEFT_CONTROL.code, KeyPosition { x: 0, y: 5 }),
    (LEFT_WIN.code, KeyPosition { x: 1, y: 5 }),
    (LEFT_ALT.code, KeyPosition { x: 2, y: 5 }),
    (SPACE.code, KeyPosition { x: 5, y: 5 }),
    (RIGHT_ALT.code, KeyPosition { x: 8, y: 5 }),
    (RIGHT_WIN.code, KeyPosition { x: 9, y: 5 }),
    (RIGHT_CONTROL.code, KeyPosition { x: 10, y: 5 }),
    (LEFT.code, KeyPosition { x: 15, y: 5 }),
    (DOWN.code, KeyPosition { x: 16, y: 5 }),
    (RIGHT.code, KeyPosition { x: 17, y: 5 }),
    (NUMPAD0.code, KeyPosition { x: 18, y: 5 }),
    (NUMPAD_DECIMAL.code, KeyPosition { x: 20, y: 5 }),
];

impl Key {
    /// Returns the position of the key on the layout, if it has one.
    pub fn position(&self) -> Option<KeyPosition> {
        KEY_POSITIONS
            .iter()
            .find(|(code, _)| *code == self.code)
            .map(|(_, pos)| *pos)
    }
}

/// Returns the key for a canonical code. Unknown codes yield a nameless key
/// so that events from unusual hardware still flow through the pipeline.
pub fn find_key_code(code: u32) -> Key {
    ALL_KEYS
        .iter()
        .copied()
        .find(|k| k.code == code)
        .unwrap_or(Key { code, name: "" })
}

/// Returns the key with the given name, matched case-insensitively.
pub fn find_key(name: &str) -> Option<Key> {
    ALL_KEYS
        .iter()
        .copied()
        .find(|k| k.name.eq_ignore_ascii_case(name))
}

/// Pan value for a key position, between -1.0 (left) and 1.0 (right).
/// `max_x` is the number of contiguous horizontal keys being panned across.
pub fn pan_value_for_position(pos: KeyPosition, max_x: u32) -> f64 {
    f64::from(pos.x + 1) / f64::from(max_x) * 2.0 - 1.0
}

/// The set of keys treated as modifiers for hotkey matching and the
/// on-screen-keys overlay. Owned by the engine so tests can scope it.
pub struct ModifierSet {
    keys: RwLock<Vec<Key>>,
}

impl ModifierSet {
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(vec![
                LEFT_CONTROL,
                RIGHT_CONTROL,
                LEFT_ALT,
                RIGHT_ALT,
                LEFT_WIN,
                RIGHT_WIN,
            ]),
        }
    }

    pub fn add(&self, key: Key) {
        let mut keys = self.keys.write();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    pub fn remove(&self, key: Key) {
        self.keys.write().retain(|k| k.code != key.code);
    }

    pub fn list(&self) -> Vec<Key> {
        self.keys.read().clone()
    }

    pub fn is_modifier(&self, key: Key) -> bool {
        self.keys.read().iter().any(|k| k.code == key.code)
    }
}

impl Default for ModifierSet {
    fn default() -> Self {
        Self::new()
    }
}
