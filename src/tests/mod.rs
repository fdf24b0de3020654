mod helper;
mod sync_end_to_end;
