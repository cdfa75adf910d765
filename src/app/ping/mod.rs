pub mod ping_router;
