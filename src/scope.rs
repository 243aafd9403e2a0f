use std::fmt;

/// Hierarchical name, kept as a stack of path segments.
///
/// Every stage of a network lives under its own scope (`unet/contracting/step_1`),
/// so two stages never share a name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    segments: Vec<String>,
}

impl Scope {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            segments: vec![name.into()],
        }
    }

    pub fn push(&mut self, segment: impl Into<String>) {
        self.segments.push(segment.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.segments.pop()
    }

    /// Returns a new scope nested one level below this one.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut scope = self.clone();
        scope.push(segment);
        scope
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Full name of `leaf` inside this scope.
    pub fn name(&self, leaf: &str) -> String {
        self.child(leaf).to_string()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}
