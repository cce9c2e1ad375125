//! Repository integration tests. These need PostgreSQL with migrations applied.

mod emotion_repository_tests;
