use std::collections::VecDeque;

/// Keys held while a program runs.
pub const KEYBUF_LEN: usize = 16;

/// A key press: the shift state and the HP-42S key code (1-37).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key {
    pub shift: bool,
    pub code: u8,
}

impl Key {
    /// The number GETKEY reports; shifted keys count from 38.
    pub fn getkey_code(self) -> u8 {
        if self.shift {
            self.code + 37
        } else {
            self.code
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct KeyBuf {
    keys: VecDeque<Key>,
}

impl KeyBuf {
    pub fn new() -> KeyBuf {
        KeyBuf::default()
    }

    /// Keys beyond the sixteenth are dropped.
    pub fn push(&mut self, key: Key) -> bool {
        if self.keys.len() >= KEYBUF_LEN {
            return false;
        }
        self.keys.push_back(key);
        true
    }

    pub fn pop(&mut self) -> Option<Key> {
        self.keys.pop_front()
    }

    pub fn clear(&mut self) {
        self.keys.clear()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_is_dropped() {
        let mut kb = KeyBuf::new();
        for code in 1..=20 {
            kb.push(Key { shift: false, code });
        }
        assert_eq!(kb.len(), KEYBUF_LEN);
        assert_eq!(kb.pop().map(|k| k.code), Some(1));
        assert_eq!(kb.iter().last().map(|k| k.code), Some(16));
    }
}
