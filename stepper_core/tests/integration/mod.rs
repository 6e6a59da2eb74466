mod common;
mod control;
mod motion;
mod reference;
mod timing;
