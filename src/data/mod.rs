pub mod alert;
pub mod node;
pub mod reltime;
pub mod reservation;

pub use alert::{AlertRecord, HousekeepingEntry, LogTable};
pub use node::Node;
pub use reltime::relative_time;
pub use reservation::{
    CheckIn, CheckOut, NewReservation, Reservation, ReservationFilter, Snooze, TimeUnit,
    SECONDS_PER_DAY, SECONDS_PER_HOUR, SECONDS_PER_MINUTE,
};
