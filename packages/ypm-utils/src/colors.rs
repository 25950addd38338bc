use colored::{Color, Colorize};

/// What kind of value is being printed. Messages color each interpolated
/// value by its kind so that package patterns, versions and paths stand
/// out from the surrounding prose.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
    String,
    Number,
    Boolean,
    Null,
    Pattern,
    Version,
    Range,
    Integrity,
    Path,
}

impl DataType {
    pub fn color(self) -> Color {
        let (r, g, b) = match self {
            DataType::String | DataType::Integrity => (95, 175, 95),
            DataType::Number | DataType::Version => (255, 200, 40),
            DataType::Boolean => (240, 150, 40),
            DataType::Null => (150, 90, 175),
            DataType::Pattern => (120, 170, 250),
            DataType::Range => (0, 200, 200),
            DataType::Path => (210, 100, 210),
        };

        Color::TrueColor { r, g, b }
    }

    pub fn colorize(self, value: &str) -> String {
        value.color(self.color()).to_string()
    }
}
