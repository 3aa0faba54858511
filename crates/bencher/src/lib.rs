//! Shared fixtures for the request parser benchmarks.

/// A named request fixture and the size class it is reported under.
#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    file: TestFile,
}

impl TestCase {
    pub fn small(name: &'static str, file: TestFile) -> Self {
        Self { name, group: TestGroup::Small, file }
    }

    pub fn large(name: &'static str, file: TestFile) -> Self {
        Self { name, group: TestGroup::Large, file }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn file(&self) -> &TestFile {
        &self.file
    }
}

/// A raw request captured into `resources/request`.
#[derive(Debug, Copy, Clone)]
pub struct TestFile {
    file_name: &'static str,
    content: &'static str,
}

impl TestFile {
    pub const fn new(file_name: &'static str, content: &'static str) -> Self {
        Self { file_name, content }
    }

    pub fn content(&self) -> &'static str {
        self.content
    }

    pub fn file_name(&self) -> &'static str {
        self.file_name
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestGroup {
    /// A request line plus a handful of headers.
    Small,
    /// A browser form submission with many headers and a body.
    Large,
}
