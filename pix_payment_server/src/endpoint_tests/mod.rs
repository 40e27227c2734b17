mod dev;
mod helpers;
mod mocks;
mod payments;
mod realtime;
mod webhook;
