//! Test suites for the transformation environment.

mod environment;
mod live;
mod support;
