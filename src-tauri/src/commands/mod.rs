pub(crate) mod mascot_commands;
