pub mod config;
pub mod evidence;
pub mod helpdesk;
pub mod kb;
pub mod llm;
pub mod shared;
pub mod tickets;
pub mod triage;
