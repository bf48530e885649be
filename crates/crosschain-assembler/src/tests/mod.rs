mod sign;
mod stages;
