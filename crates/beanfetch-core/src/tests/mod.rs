//! Test infrastructure shared by the unit tests.
