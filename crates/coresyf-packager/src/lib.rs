//! CoReSyF Tool Packaging
//!
//! A tool bundle is a directory holding an entry script, exactly one
//! `*manifest.json` and an examples script. [`ToolTester`] runs the
//! documented examples as smoke tests; [`Packager`] checks the bundle's
//! shape, runs the examples and zips the bundle when they all pass.

pub mod examples;
pub mod packager;
pub mod tester;

pub use examples::{load_examples, parse_examples, ExampleParseError, ToolExampleCommand};
pub use packager::{archive_directory, BundleLayout, PackageError, Packager};
pub use tester::{Credentials, ExampleOutcome, TestFailure, TestReport, ToolTester};
