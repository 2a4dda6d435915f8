pub(super) mod replay;
