mod cache_tests;
mod evaluation_tests;
mod fixtures;
mod grammar_tests;
mod snippet_tests;
