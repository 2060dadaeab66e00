use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    UnknownClass {
        package: String,
        class: String,
    },
    UnknownFeature {
        class: String,
        feature: usize,
    },
    /// A list operation was applied to a single-valued feature.
    NotManyValued {
        class: String,
        feature: String,
    },
    /// `set` was applied to a many-valued feature.
    NotSingleValued {
        class: String,
        feature: String,
    },
    TypeMismatch {
        class: String,
        feature: String,
        value: String,
    },
    IndexOutOfBounds {
        feature: String,
        index: usize,
        len: usize,
    },
    InvalidMetamodel(String),
    /// A cross-reference points outside the tree being serialized.
    DanglingReference {
        feature: String,
    },
    NoRoot,
    Io(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::UnknownClass { package, class } => {
                write!(f, "package {} has no class named {}", package, class)
            }
            ModelError::UnknownFeature { class, feature } => {
                write!(f, "class {} has no feature with id {}", class, feature)
            }
            ModelError::NotManyValued { class, feature } => {
                write!(f, "feature {}.{} is not many-valued", class, feature)
            }
            ModelError::NotSingleValued { class, feature } => {
                write!(f, "feature {}.{} is not single-valued", class, feature)
            }
            ModelError::TypeMismatch {
                class,
                feature,
                value,
            } => write!(
                f,
                "value of kind {} does not fit feature {}.{}",
                value, class, feature
            ),
            ModelError::IndexOutOfBounds {
                feature,
                index,
                len,
            } => write!(
                f,
                "index {} out of bounds for feature {} of length {}",
                index, feature, len
            ),
            ModelError::InvalidMetamodel(message) => {
                write!(f, "invalid metamodel: {}", message)
            }
            ModelError::DanglingReference { feature } => write!(
                f,
                "feature {} references an object outside the serialized tree",
                feature
            ),
            ModelError::NoRoot => write!(f, "resource has no root object"),
            ModelError::Io(message) => write!(f, "io error: {}", message),
        }
    }
}

impl std::error::Error for ModelError {}
