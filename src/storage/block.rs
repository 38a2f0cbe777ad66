use std::fmt;

/// Identifies one fixed-size block of a named file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockId {
    file_name: String,
    number: u32,
}

impl BlockId {
    /// Block number reserved for the end-of-file lock of a file.
    pub const END_OF_FILE: u32 = u32::MAX;

    pub fn new(file_name: impl Into<String>, number: u32) -> Self {
        Self {
            file_name: file_name.into(),
            number,
        }
    }

    /// The sentinel block locked to serialize `size` against `append`.
    pub fn end_of_file(file_name: impl Into<String>) -> Self {
        Self::new(file_name, Self::END_OF_FILE)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn is_end_of_file(&self) -> bool {
        self.number == Self::END_OF_FILE
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_end_of_file() {
            write!(f, "[file {}, end of file]", self.file_name)
        } else {
            write!(f, "[file {}, block {}]", self.file_name, self.number)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equality_by_fields() {
        let a = BlockId::new("data", 3);
        let b = BlockId::new(String::from("data"), 3);
        assert_eq!(a, b);
        assert_ne!(a, BlockId::new("data", 4));
        assert_ne!(a, BlockId::new("other", 3));

        let set: HashSet<_> = [a.clone(), b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_end_of_file_sentinel() {
        let eof = BlockId::end_of_file("data");
        assert!(eof.is_end_of_file());
        assert_ne!(eof, BlockId::new("data", 0));
        assert_eq!(eof.to_string(), "[file data, end of file]");
        assert_eq!(BlockId::new("data", 7).to_string(), "[file data, block 7]");
    }
}
